use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::InsightsError;

/// One tracked event, as returned by the warehouse query.
///
/// The query already collapses duplicates, so a row is one
/// (user, event, timestamp) occurrence on the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub event_name: String,
    pub raw_user_id: String,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub phrase: Option<String>,
    /// Profile attributes captured for the user. Null attributes are absent.
    #[serde(default)]
    pub profile: BTreeMap<ProfileAttribute, String>,
}

impl EventRecord {
    pub fn profile_value(&self, attribute: ProfileAttribute) -> Option<&str> {
        self.profile.get(&attribute).map(String::as_str)
    }
}

/// Demographic and behavioral dimensions available for conversion breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAttribute {
    Idade,
    Genero,
    Renda,
    Escolaridade,
    EstadoCivil,
    Profissao,
    Cidade,
    Estado,
    PossuiFilhos,
    Patrimonio,
    Objetivo,
    PerfilInvestidor,
}

impl ProfileAttribute {
    pub const ALL: &'static [ProfileAttribute] = &[
        Self::Idade,
        Self::Genero,
        Self::Renda,
        Self::Escolaridade,
        Self::EstadoCivil,
        Self::Profissao,
        Self::Cidade,
        Self::Estado,
        Self::PossuiFilhos,
        Self::Patrimonio,
        Self::Objetivo,
        Self::PerfilInvestidor,
    ];

    /// Column / event parameter key used in the warehouse.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Idade => "idade",
            Self::Genero => "genero",
            Self::Renda => "renda",
            Self::Escolaridade => "escolaridade",
            Self::EstadoCivil => "estado_civil",
            Self::Profissao => "profissao",
            Self::Cidade => "cidade",
            Self::Estado => "estado",
            Self::PossuiFilhos => "possui_filhos",
            Self::Patrimonio => "patrimonio",
            Self::Objetivo => "objetivo",
            Self::PerfilInvestidor => "perfil_investidor",
        }
    }
}

impl fmt::Display for ProfileAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProfileAttribute {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|attr| attr.key() == s)
            .ok_or_else(|| InsightsError::UnknownAttribute(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_keys_round_trip_through_from_str() {
        assert_eq!(ProfileAttribute::ALL.len(), 12);
        for attr in ProfileAttribute::ALL {
            assert_eq!(attr.key().parse::<ProfileAttribute>().unwrap(), *attr);
        }
        assert!("shoe_size".parse::<ProfileAttribute>().is_err());
    }

    #[test]
    fn test_event_record_deserializes_without_optional_fields() {
        let json = r#"{
            "event_date": "2025-01-01",
            "event_time": "10:15:00",
            "event_name": "first_visit",
            "raw_user_id": "u1"
        }"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.utm_term, None);
        assert_eq!(record.phrase, None);
        assert!(record.profile.is_empty());
    }

    #[test]
    fn test_profile_map_uses_snake_case_keys() {
        let json = r#"{
            "event_date": "2025-01-01",
            "event_time": "10:15:00",
            "event_name": "lead",
            "raw_user_id": "u1",
            "profile": {"estado_civil": "casado", "renda": "5000"}
        }"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.profile_value(ProfileAttribute::EstadoCivil), Some("casado"));
        assert_eq!(record.profile_value(ProfileAttribute::Renda), Some("5000"));
        assert_eq!(record.profile_value(ProfileAttribute::Idade), None);
    }
}
