#![allow(dead_code)]

//! Test doubles shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::storage::HotCache;
use crate::utils::http::{Transport, TransportError};
use crate::utils::time::{Clock, Sleeper};

pub const BASE_URL: &str = "http://upstream.test";

pub fn url(path: &str) -> String {
    format!("{BASE_URL}/{path}")
}

type Reply = std::result::Result<String, TransportError>;

#[derive(Default)]
struct Script {
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
}

/// Transport that replays canned responses.
///
/// A registered URL matches exactly, or as a prefix when it ends with `/` or
/// the remainder is a query string; the longest match wins. Queued replies are
/// consumed first, then the fallback repeats. Unknown URLs get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `url`.
    pub fn push(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .queued
            .push_back(reply);
        self
    }

    /// Reply with `reply` whenever nothing is queued for `url`.
    pub fn always(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .fallback = Some(reply);
        self
    }

    pub fn push_json(&self, url: impl Into<String>, body: &serde_json::Value) -> &Self {
        self.push(url, Ok(body.to_string()))
    }

    pub fn always_json(&self, url: impl Into<String>, body: &serde_json::Value) -> &Self {
        self.always(url, Ok(body.to_string()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_text(&self, url: &str) -> Reply {
        self.calls.lock().unwrap().push(url.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let matched = scripts
            .keys()
            .filter(|k| matches_url(url, k))
            .max_by_key(|k| k.len())
            .cloned();

        match matched.and_then(|k| scripts.get_mut(&k)) {
            Some(script) => match script.queued.pop_front() {
                Some(reply) => reply,
                None => script
                    .fallback
                    .clone()
                    .unwrap_or(Err(TransportError::Status(404))),
            },
            None => Err(TransportError::Status(404)),
        }
    }
}

fn matches_url(url: &str, key: &str) -> bool {
    url == key
        || (url.starts_with(key) && (key.ends_with('/') || url[key.len()..].starts_with('?')))
}

/// Sleeper that returns immediately and remembers what it was asked.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Sleeper that parks every caller until the test releases it.
pub struct GatedSleeper {
    slept: Mutex<Vec<Duration>>,
    entered: tokio::sync::Notify,
    gate: tokio::sync::Semaphore,
}

impl Default for GatedSleeper {
    fn default() -> Self {
        Self {
            slept: Mutex::new(Vec::new()),
            entered: tokio::sync::Notify::new(),
            gate: tokio::sync::Semaphore::new(0),
        }
    }
}

impl GatedSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }

    /// Wait until some caller is parked in `sleep`.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one parked caller go.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Sleeper for GatedSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        self.entered.notify_one();
        self.gate.acquire().await.unwrap().forget();
    }
}

/// Clock frozen at a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hot cache that counts writes and never expires.
#[derive(Default)]
pub struct CountingHotCache {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl CountingHotCache {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Insert without counting as a write.
    pub fn seed<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.seed_raw(key, &serde_json::to_string(value).unwrap());
    }

    pub fn seed_raw(&self, key: &str, raw: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), raw.to_string());
    }

    fn write(&self, key: &str, value: String) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }
}

#[async_trait]
impl HotCache for CountingHotCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.write(key, value);
        Ok(())
    }

    async fn set_ex(&self, key: &str, _ttl: Duration, value: String) -> Result<()> {
        self.write(key, value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

/// Ergast-shaped payload builders.
pub mod payloads {
    use serde_json::{Value, json};

    pub fn winning_result(driver_id: &str, family_name: &str, team: &str) -> Value {
        json!({
            "position": "1",
            "laps": "57",
            "Time": { "time": "1:31:44.742" },
            "Driver": {
                "driverId": driver_id,
                "permanentNumber": "1",
                "url": format!("http://en.wikipedia.org/wiki/{family_name}"),
                "givenName": "Test",
                "familyName": family_name,
                "dateOfBirth": "1997-09-30",
                "nationality": "Dutch"
            },
            "Constructor": {
                "name": team,
                "url": format!("http://en.wikipedia.org/wiki/{team}")
            }
        })
    }

    pub fn race(season: i32, round: u32, results: Vec<Value>) -> Value {
        json!({
            "season": season.to_string(),
            "round": round.to_string(),
            "raceName": format!("Round {round} Grand Prix"),
            "url": format!("http://en.wikipedia.org/wiki/{season}_round_{round}"),
            "date": format!("{season}-03-{:02}", round.min(28)),
            "Results": results
        })
    }

    pub fn results_page(season: i32, races: Vec<Value>, offset: usize, total: usize) -> Value {
        json!({
            "MRData": {
                "limit": "100",
                "offset": offset.to_string(),
                "total": total.to_string(),
                "RaceTable": { "season": season.to_string(), "Races": races }
            }
        })
    }

    pub fn standings(year: i32, round: u32, leader: Option<(&str, &str)>) -> Value {
        let driver_standings: Vec<Value> = leader
            .map(|(given, family)| {
                vec![json!({
                    "position": "1",
                    "points": "400",
                    "Driver": { "givenName": given, "familyName": family }
                })]
            })
            .unwrap_or_default();
        json!({
            "MRData": {
                "StandingsTable": {
                    "season": year.to_string(),
                    "round": round.to_string(),
                    "StandingsLists": [{
                        "season": year.to_string(),
                        "round": round.to_string(),
                        "DriverStandings": driver_standings
                    }]
                }
            }
        })
    }

    pub fn season(total: u32) -> Value {
        json!({
            "MRData": {
                "limit": "30",
                "offset": "0",
                "total": total.to_string(),
                "RaceTable": { "Races": [] }
            }
        })
    }
}
