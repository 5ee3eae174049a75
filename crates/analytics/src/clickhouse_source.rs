//! Read-only ClickHouse client for the landing page events table.

use chrono::{NaiveDate, NaiveTime};
use clickhouse::Row;
use insights_core::config::WarehouseConfig;
use insights_core::{EventRecord, InsightsError, InsightsResult, ProfileAttribute};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::query::EventQuery;

/// One result row. Field order follows the SELECT list of [`EventQuery::sql`].
#[derive(Debug, Row, Deserialize)]
struct WarehouseRow {
    event_date: String,
    event_time: String,
    event_name: String,
    user_pseudo_id: String,
    utm_term: Option<String>,
    frase: Option<String>,
    idade: Option<String>,
    genero: Option<String>,
    renda: Option<String>,
    escolaridade: Option<String>,
    estado_civil: Option<String>,
    profissao: Option<String>,
    cidade: Option<String>,
    estado: Option<String>,
    possui_filhos: Option<String>,
    patrimonio: Option<String>,
    objetivo: Option<String>,
    perfil_investidor: Option<String>,
}

impl WarehouseRow {
    fn into_record(self) -> InsightsResult<EventRecord> {
        let event_date = NaiveDate::parse_from_str(&self.event_date, "%Y-%m-%d").map_err(|e| {
            InsightsError::Warehouse(format!("bad event_date {:?}: {e}", self.event_date))
        })?;
        let event_time = NaiveTime::parse_from_str(&self.event_time, "%H:%M:%S").map_err(|e| {
            InsightsError::Warehouse(format!("bad event_time {:?}: {e}", self.event_time))
        })?;

        let attributes = [
            (ProfileAttribute::Idade, self.idade),
            (ProfileAttribute::Genero, self.genero),
            (ProfileAttribute::Renda, self.renda),
            (ProfileAttribute::Escolaridade, self.escolaridade),
            (ProfileAttribute::EstadoCivil, self.estado_civil),
            (ProfileAttribute::Profissao, self.profissao),
            (ProfileAttribute::Cidade, self.cidade),
            (ProfileAttribute::Estado, self.estado),
            (ProfileAttribute::PossuiFilhos, self.possui_filhos),
            (ProfileAttribute::Patrimonio, self.patrimonio),
            (ProfileAttribute::Objetivo, self.objetivo),
            (ProfileAttribute::PerfilInvestidor, self.perfil_investidor),
        ];
        let profile: BTreeMap<_, _> = attributes
            .into_iter()
            .filter_map(|(attr, value)| value.map(|v| (attr, v)))
            .collect();

        Ok(EventRecord {
            event_date,
            event_time,
            event_name: self.event_name,
            raw_user_id: self.user_pseudo_id,
            utm_term: self.utm_term,
            phrase: self.frase,
            profile,
        })
    }
}

/// ClickHouse-backed event source.
#[derive(Clone)]
pub struct ClickHouseWarehouse {
    client: clickhouse::Client,
}

impl ClickHouseWarehouse {
    pub fn new(config: &WarehouseConfig) -> Self {
        let mut client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);
        if !config.username.is_empty() {
            client = client
                .with_user(&config.username)
                .with_password(&config.password);
        }
        info!(url = %config.url, database = %config.database, "ClickHouse warehouse configured");
        Self { client }
    }

    /// Run the events query. Any failure aborts the fetch; there is no retry.
    pub async fn fetch(&self, query: &EventQuery) -> InsightsResult<Vec<EventRecord>> {
        let started = Instant::now();
        let sql = query.sql();
        debug!(sql = %sql, "Running events query");

        let mut q = self.client.query(&sql);
        for bind in query.binds() {
            q = q.bind(bind);
        }

        let rows = match q.fetch_all::<WarehouseRow>().await {
            Ok(rows) => rows,
            Err(e) => {
                metrics::counter!("warehouse.errors").increment(1);
                error!(error = %e, "Events query failed");
                return Err(InsightsError::Warehouse(e.to_string()));
            }
        };

        let records = rows
            .into_iter()
            .map(WarehouseRow::into_record)
            .collect::<InsightsResult<Vec<_>>>()?;

        metrics::counter!("warehouse.fetches").increment(1);
        info!(
            rows = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Events query complete"
        );
        Ok(records)
    }

    pub async fn ping(&self) -> InsightsResult<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(|e| InsightsError::Warehouse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> WarehouseRow {
        WarehouseRow {
            event_date: "2025-01-02".into(),
            event_time: "13:45:10".into(),
            event_name: "first_visit".into(),
            user_pseudo_id: "123.456".into(),
            utm_term: Some("seguro auto".into()),
            frase: None,
            idade: Some("34".into()),
            genero: None,
            renda: Some("alta".into()),
            escolaridade: None,
            estado_civil: None,
            profissao: None,
            cidade: None,
            estado: None,
            possui_filhos: None,
            patrimonio: None,
            objetivo: None,
            perfil_investidor: Some("moderado".into()),
        }
    }

    #[test]
    fn test_row_converts_into_record() {
        let record = row().into_record().unwrap();
        assert_eq!(record.event_date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(record.event_time, NaiveTime::from_hms_opt(13, 45, 10).unwrap());
        assert_eq!(record.raw_user_id, "123.456");
        assert_eq!(record.utm_term.as_deref(), Some("seguro auto"));
        assert_eq!(record.phrase, None);
        assert_eq!(record.profile.len(), 3);
        assert_eq!(record.profile_value(ProfileAttribute::PerfilInvestidor), Some("moderado"));
    }

    #[test]
    fn test_bad_date_is_a_warehouse_error() {
        let mut bad = row();
        bad.event_date = "20250102".into();
        assert!(matches!(bad.into_record(), Err(InsightsError::Warehouse(_))));
    }
}
