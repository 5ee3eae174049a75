//! End-to-end run of the dashboard pipeline over a small event table.

use chrono::{NaiveDate, NaiveTime};
use insights_core::config::PipelineConfig;
use insights_core::{EventRecord, ProfileAttribute};
use insights_platform::{PasswordGate, SessionManager};
use insights_reporting::{DashboardPipeline, DashboardQuery};
use std::collections::BTreeMap;

fn record(name: &str, user: &str, term: Option<&str>, phrase: Option<&str>) -> EventRecord {
    let mut profile = BTreeMap::new();
    if user == "u1" {
        profile.insert(ProfileAttribute::Renda, "alta".to_string());
    } else if user == "u2" {
        profile.insert(ProfileAttribute::Renda, "baixa".to_string());
    }
    EventRecord {
        event_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        event_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        event_name: name.to_string(),
        raw_user_id: user.to_string(),
        utm_term: term.map(str::to_string),
        phrase: phrase.map(str::to_string),
        profile,
    }
}

fn sample() -> Vec<EventRecord> {
    let phrase = Some("quero simular seguro residencial");
    vec![
        record("first_visit", "u1", Some("seguro casa"), phrase),
        record("first_visit", "u2", None, None),
        record("envio_leads_leadster", "u1", Some("seguro casa"), phrase),
        record("envio_leads_leadster", "unknown", None, None),
        record("envio_leads_leadster", "unknown", None, None),
        record("X", "u1", Some("seguro casa"), phrase),
        record("X", "u2", None, None),
        record("X", "unknown", None, None),
        record("X", "unknown", None, None),
        record("X", "unknown", None, None),
    ]
}

#[test]
fn test_end_to_end_dashboard() {
    let sessions = SessionManager::new(PasswordGate::new("orbital"));
    let id = sessions.create_session().session_id;
    sessions.login(id, "orbital").unwrap();
    let session = sessions.get(id).unwrap();

    let pipeline = DashboardPipeline::from_config(&PipelineConfig::default()).unwrap();
    let report = pipeline
        .run(
            &session,
            &sample(),
            &DashboardQuery {
                events: vec!["Todos".into()],
                terms: vec!["Todos".into()],
                profile_attribute: Some(ProfileAttribute::Renda),
                ..DashboardQuery::default()
            },
        )
        .unwrap();

    // "unknown" rows are gone and two users got surrogates.
    assert_eq!(report.tracked_users, 2);
    assert_eq!(report.events.len(), 5);
    assert!(report.events.iter().all(|e| e.user_id == 1000 || e.user_id == 1001));

    // Only u1 sent the lead form.
    let lead_card = report.funnel.iter().find(|c| c.label == "Envio lead").unwrap();
    assert_eq!(lead_card.users, 1);

    let top: Vec<_> = report.top_phrase_words.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(top, vec!["quero", "simular", "seguro", "residencial"]);
    assert_eq!(report.top_term_words[0].word, "seguro");

    let profile = report.profile.unwrap();
    let rates: Vec<_> = profile
        .conversion
        .iter()
        .map(|r| (r.value.as_str(), r.conversion_rate))
        .collect();
    assert_eq!(rates, vec![("alta", 100.0), ("baixa", 0.0)]);

    let series = report.timeseries.unwrap();
    assert_eq!(series.len(), 3);
}

#[test]
fn test_locked_session_sees_nothing() {
    let sessions = SessionManager::new(PasswordGate::new("orbital"));
    let id = sessions.create_session().session_id;
    sessions.login(id, "wrong").unwrap();
    let session = sessions.get(id).unwrap();

    let pipeline = DashboardPipeline::from_config(&PipelineConfig::default()).unwrap();
    assert!(pipeline.run(&session, &sample(), &DashboardQuery::default()).is_err());
}
