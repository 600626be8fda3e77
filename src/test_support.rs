// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fakes for unit tests.

use crate::appliance::{ApplianceClient, QueryParams, Session};
use crate::errors::ApplianceError;
use crate::registry::InstanceRegistry;
use crate::tokens::Clock;
use crate::types::{Credential, DnsRecord, Instance};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn instance(name: &str) -> Instance {
    Instance::new(
        name,
        Url::parse(&format!("http://{name}.lan")).unwrap(),
        Credential::new("secret"),
    )
}

pub fn registry(names: &[&str]) -> InstanceRegistry {
    InstanceRegistry::new(names.iter().map(|name| instance(name)).collect()).unwrap()
}

/// In-memory appliance keyed by instance name.
#[derive(Default)]
pub struct FakeAppliance {
    records: Mutex<HashMap<String, Vec<DnsRecord>>>,
    unreachable: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    deletes: Mutex<Vec<(String, DnsRecord)>>,
}

impl FakeAppliance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, instance: &str, records: Vec<DnsRecord>) {
        self.records
            .lock()
            .unwrap()
            .insert(instance.to_string(), records);
    }

    pub fn records(&self, instance: &str) -> Vec<DnsRecord> {
        self.records
            .lock()
            .unwrap()
            .get(instance)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_unreachable(&self, instance: &str, unreachable: bool) {
        let mut set = self.unreachable.lock().unwrap();
        if unreachable {
            set.insert(instance.to_string());
        } else {
            set.remove(instance);
        }
    }

    pub fn panic_on(&self, instance: &str) {
        self.panicking.lock().unwrap().insert(instance.to_string());
    }

    pub fn delay(&self, instance: &str, by: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(instance.to_string(), by);
    }

    pub fn deletes(&self) -> Vec<(String, DnsRecord)> {
        self.deletes.lock().unwrap().clone()
    }

    fn check(&self, name: &str) -> Result<(), ApplianceError> {
        let panics = self.panicking.lock().unwrap().contains(name);
        assert!(!panics, "simulated adapter bug on {name}");
        if self.unreachable.lock().unwrap().contains(name) {
            return Err(ApplianceError::Unavailable {
                instance: name.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn pause(&self, name: &str) {
        let delay = self.delays.lock().unwrap().get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ApplianceClient for FakeAppliance {
    async fn authenticate(&self, instance: &Instance) -> Result<Session, ApplianceError> {
        self.check(&instance.name)?;
        Ok(Session::new(instance.clone(), Some("sid".to_string())))
    }

    async fn list_local_dns(&self, session: &Session) -> Result<Vec<DnsRecord>, ApplianceError> {
        let name = &session.instance().name;
        self.pause(name).await;
        self.check(name)?;
        Ok(self.records(name))
    }

    async fn add_record(&self, session: &Session, record: &DnsRecord) -> Result<(), ApplianceError> {
        let name = &session.instance().name;
        self.check(name)?;
        self.records
            .lock()
            .unwrap()
            .entry(name.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn delete_record(
        &self,
        session: &Session,
        record: &DnsRecord,
    ) -> Result<(), ApplianceError> {
        let name = &session.instance().name;
        self.check(name)?;
        let mut all = self.records.lock().unwrap();
        let records = all.entry(name.clone()).or_default();
        let Some(position) = records.iter().position(|r| r == record) else {
            return Err(ApplianceError::Rejected {
                instance: name.clone(),
                status_code: 404,
                reason: "Item not found".to_string(),
            });
        };
        records.remove(position);
        drop(all);
        self.deletes
            .lock()
            .unwrap()
            .push((name.clone(), record.clone()));
        Ok(())
    }

    async fn queries(&self, session: &Session, params: &QueryParams) -> Result<Value, ApplianceError> {
        let name = &session.instance().name;
        self.check(name)?;
        Ok(json!({ "queries": [], "length": params.length, "domain": params.domain }))
    }

    async fn query_history(&self, session: &Session) -> Result<Value, ApplianceError> {
        self.check(&session.instance().name)?;
        Ok(json!({ "history": [] }))
    }

    async fn query_suggestions(&self, session: &Session) -> Result<Value, ApplianceError> {
        self.check(&session.instance().name)?;
        Ok(json!({ "suggestions": { "domain": [] } }))
    }
}
