//! External calendar provider backed by Google Calendar, authenticated via
//! a service-account JWT exchange (the same auth shape used elsewhere in
//! this codebase for Google-hosted APIs).

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD}, Engine};
use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use ring::signature::{self, RsaKeyPair};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use concierge_core::types::{CanonicalSlot, SlotSource, TimeOfDay};

use crate::error::{BookingError, Result};
use crate::provider::BookingProvider;
use crate::types::{Booking, BookingOutcome, FindBookingResult, SlotQuery};

const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

struct CachedToken {
    token: String,
    expires_at: i64,
}

#[derive(Clone)]
struct ServiceAccount {
    client_email: String,
    token_uri: String,
    private_key_der: Vec<u8>,
}

#[derive(Deserialize)]
struct ServiceAccountJson {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    calendar_id: String,
    service_account: ServiceAccount,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl GoogleCalendarProvider {
    /// Loads a GCP service-account key file and binds it to one calendar id.
    /// One instance is built per tenant — never shared across tenants.
    pub fn from_file(path: &str, calendar_id: String) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| BookingError::Credentials(format!("cannot read service account key: {e}")))?;
        let sa_json: ServiceAccountJson = serde_json::from_str(&data)
            .map_err(|e| BookingError::Credentials(format!("invalid service account JSON: {e}")))?;
        let private_key_der = pem_to_der(&sa_json.private_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            calendar_id,
            service_account: ServiceAccount {
                client_email: sa_json.client_email,
                token_uri: sa_json.token_uri,
                private_key_der,
            },
            cached: Arc::new(RwLock::new(None)),
        })
    }

    async fn ensure_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        {
            let cached = self.cached.read().await;
            if let Some(ref c) = *cached {
                if now + 120 < c.expires_at {
                    return Ok(c.token.clone());
                }
            }
        }
        let mut cached = self.cached.write().await;
        let now = Utc::now().timestamp();
        if let Some(ref c) = *cached {
            if now + 120 < c.expires_at {
                return Ok(c.token.clone());
            }
        }
        info!("exchanging service account JWT for Calendar API access token");
        let new_token = self.exchange_jwt().await?;
        let result = new_token.token.clone();
        *cached = Some(new_token);
        Ok(result)
    }

    async fn exchange_jwt(&self) -> Result<CachedToken> {
        let now = Utc::now().timestamp();
        let exp = now + 3600;
        let header = serde_json::json!({"alg": "RS256", "typ": "JWT"});
        let claims = serde_json::json!({
            "iss": self.service_account.client_email,
            "scope": CALENDAR_SCOPE,
            "aud": self.service_account.token_uri,
            "iat": now,
            "exp": exp,
        });
        let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string().as_bytes());
        let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        let message = format!("{header_b64}.{claims_b64}");

        let key_pair = RsaKeyPair::from_pkcs8(&self.service_account.private_key_der)
            .map_err(|e| BookingError::Credentials(format!("invalid RSA private key: {e}")))?;
        let mut sig = vec![0u8; key_pair.public().modulus_len()];
        key_pair
            .sign(&signature::RSA_PKCS1_SHA256, &ring::rand::SystemRandom::new(), message.as_bytes(), &mut sig)
            .map_err(|e| BookingError::Credentials(format!("RSA signing failed: {e}")))?;
        let jwt = format!("{message}.{}", URL_SAFE_NO_PAD.encode(&sig));

        let resp = self
            .client
            .post(&self.service_account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BookingError::Credentials(format!("token exchange failed: {text}")));
        }
        let token_resp: TokenResponse = resp.json().await.map_err(|e| BookingError::Parse(e.to_string()))?;
        Ok(CachedToken {
            token: token_resp.access_token,
            expires_at: now + token_resp.expires_in as i64,
        })
    }

    /// Narrows the working-hours window to a stated time-of-day preference,
    /// clamped to the tenant's configured open hours.
    fn window_for_preference(preference: Option<TimeOfDay>, start_hour: u32, end_hour: u32) -> (u32, u32) {
        let (pref_start, pref_end) = match preference {
            None | Some(TimeOfDay::Any) => (start_hour, end_hour),
            Some(TimeOfDay::Morning) => (start_hour, 12),
            Some(TimeOfDay::Afternoon) => (12, 17),
            Some(TimeOfDay::Evening) => (17, end_hour),
        };
        (pref_start.max(start_hour).min(end_hour), pref_end.min(end_hour).max(start_hour))
    }
}

#[async_trait]
impl BookingProvider for GoogleCalendarProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn list_free_slots(&self, query: &SlotQuery) -> Result<Vec<CanonicalSlot>> {
        let token = self.ensure_token().await?;
        let (start_hour, end_hour) = Self::window_for_preference(query.preference, query.window_start_hour, query.window_end_hour);
        let day_start = query.date.and_time(NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap());
        let day_end = query.date.and_time(NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap());
        let time_min = Utc.from_utc_datetime(&day_start).to_rfc3339();
        let time_max = Utc.from_utc_datetime(&day_end).to_rfc3339();

        let body = serde_json::json!({
            "timeMin": time_min,
            "timeMax": time_max,
            "items": [{ "id": self.calendar_id }],
        });
        let resp = self
            .client
            .post(format!("{API_BASE}/freeBusy"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(body = %text, "freeBusy query failed");
            return Err(BookingError::Parse(text));
        }
        let parsed: FreeBusyResponse = resp.json().await.map_err(|e| BookingError::Parse(e.to_string()))?;
        let busy = parsed
            .calendars
            .get(&self.calendar_id)
            .map(|c| c.busy.clone())
            .unwrap_or_default();

        let mut slots = Vec::new();
        let step = ChronoDuration::minutes(query.duration_minutes as i64);
        let mut cursor = day_start;
        while cursor + step <= day_end && slots.len() < query.limit {
            let slot_end = cursor + step;
            let overlaps = busy.iter().any(|b| {
                b.start < slot_end_rfc3339(&slot_end) && b.end > cursor_rfc3339(&cursor)
            });
            if !overlaps {
                let start_iso = Utc.from_utc_datetime(&cursor).to_rfc3339();
                let end_iso = Utc.from_utc_datetime(&slot_end).to_rfc3339();
                slots.push(CanonicalSlot {
                    id: format!("{}-{}", self.calendar_id, start_iso),
                    start_iso,
                    end_iso,
                    label: format_label(&cursor),
                    label_vocal: format_label(&cursor),
                    day: weekday_fr(&cursor).to_string(),
                    source: SlotSource::Calendar,
                });
            }
            cursor += step;
        }
        Ok(slots)
    }

    async fn book(
        &self,
        slot: &CanonicalSlot,
        patient_name: &str,
        patient_contact: &str,
        motif: &str,
    ) -> Result<BookingOutcome> {
        let token = self.ensure_token().await?;
        let body = serde_json::json!({
            "summary": format!("{patient_name} — {motif}"),
            "description": format!("Contact: {patient_contact}\nMotif: {motif}"),
            "start": { "dateTime": slot.start_iso },
            "end": { "dateTime": slot.end_iso },
        });
        let resp = self
            .client
            .post(format!("{API_BASE}/calendars/{}/events", self.calendar_id))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 409 {
            return Ok(BookingOutcome::Taken);
        }
        if status.as_u16() == 403 {
            return Ok(BookingOutcome::PermissionDenied);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "calendar book failed");
            return Ok(BookingOutcome::TechnicalError);
        }
        let event: EventResponse = resp.json().await.map_err(|e| BookingError::Parse(e.to_string()))?;
        Ok(BookingOutcome::Booked { external_event_id: event.id })
    }

    async fn find_booking_by_name(&self, name: &str) -> Result<FindBookingResult> {
        let token = self.ensure_token().await?;
        let time_min = Utc::now().to_rfc3339();
        let resp = self
            .client
            .get(format!("{API_BASE}/calendars/{}/events", self.calendar_id))
            .bearer_auth(&token)
            .query(&[("q", name), ("timeMin", &time_min), ("singleEvents", "true"), ("orderBy", "startTime")])
            .send()
            .await?;
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BookingError::Parse(text));
        }
        let parsed: EventsListResponse = resp.json().await.map_err(|e| BookingError::Parse(e.to_string()))?;
        let name_lower = name.to_lowercase();
        let found = parsed.items.into_iter().find(|e| {
            e.summary.as_deref().unwrap_or_default().to_lowercase().contains(&name_lower)
                || e.description.as_deref().unwrap_or_default().to_lowercase().contains(&name_lower)
        });
        match found {
            None => {
                debug!(name = %name, "find_booking_by_name: not found");
                Ok(FindBookingResult::NotFound)
            }
            Some(event) => Ok(FindBookingResult::Found(Booking {
                external_event_id: Some(event.id),
                label: event.summary.unwrap_or_default(),
                start_iso: event.start.and_then(|s| s.date_time).unwrap_or_default(),
                end_iso: event.end.and_then(|e| e.date_time).unwrap_or_default(),
            })),
        }
    }

    async fn cancel(&self, booking: &Booking) -> Result<bool> {
        let Some(event_id) = booking.external_event_id.as_deref() else {
            return Ok(false);
        };
        let token = self.ensure_token().await?;
        let resp = self
            .client
            .delete(format!("{API_BASE}/calendars/{}/events/{}", self.calendar_id, event_id))
            .bearer_auth(&token)
            .send()
            .await?;
        Ok(resp.status().is_success() || resp.status().as_u16() == 410)
    }

    fn can_propose_slots(&self) -> bool {
        true
    }
}

fn cursor_rfc3339(dt: &NaiveDateTime) -> String {
    Utc.from_utc_datetime(dt).to_rfc3339()
}

fn slot_end_rfc3339(dt: &NaiveDateTime) -> String {
    Utc.from_utc_datetime(dt).to_rfc3339()
}

const WEEKDAYS_FR: [&str; 7] = ["lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche"];

fn weekday_fr(dt: &NaiveDateTime) -> &'static str {
    use chrono::Datelike;
    WEEKDAYS_FR[dt.weekday().num_days_from_monday() as usize]
}

fn format_label(dt: &NaiveDateTime) -> String {
    use chrono::Timelike;
    format!("{} à {}h{:02}", weekday_fr(dt), dt.hour(), dt.minute())
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>> {
    let b64: String = pem.lines().filter(|line| !line.starts_with("-----")).collect::<Vec<_>>().join("");
    STANDARD
        .decode(&b64)
        .map_err(|e| BookingError::Credentials(format!("invalid PEM base64: {e}")))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires")]
    expires_in: u64,
}

fn default_expires() -> u64 {
    3600
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize, Clone)]
struct FreeBusyCalendar {
    busy: Vec<BusyPeriod>,
}

#[derive(Deserialize, Clone)]
struct BusyPeriod {
    start: String,
    end: String,
}

#[derive(Deserialize)]
struct EventResponse {
    id: String,
}

#[derive(Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Deserialize)]
struct EventItem {
    id: String,
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
}

#[derive(Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morning_preference_narrows_to_open_through_noon() {
        assert_eq!(GoogleCalendarProvider::window_for_preference(Some(TimeOfDay::Morning), 9, 18), (9, 12));
    }

    #[test]
    fn evening_preference_narrows_to_five_through_close() {
        assert_eq!(GoogleCalendarProvider::window_for_preference(Some(TimeOfDay::Evening), 9, 19), (17, 19));
    }

    #[test]
    fn no_preference_keeps_full_window() {
        assert_eq!(GoogleCalendarProvider::window_for_preference(None, 9, 18), (9, 18));
    }

    #[test]
    fn label_uses_french_weekday_and_zero_padded_minutes() {
        let dt = NaiveDateTime::parse_from_str("2024-01-05 09:05:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(format_label(&dt), "vendredi à 9h05");
    }
}
