//! Dashboard aggregates. Counts span every account, admins included; only
//! the user table in [`super::services::list_users`] hides admins.
//!
//! Everything takes `now` explicitly and works in UTC calendar months.

use std::collections::HashMap;

use serde::Serialize;
use time::{util::days_in_year_month, Duration, OffsetDateTime, Time, UtcOffset};
use tracing::warn;
use uuid::Uuid;

use crate::store::{NoteRepo, SessionRepo, Store, UserRepo};

pub const DEFAULT_MONTHS_BACK: usize = 6;
pub const DEFAULT_TOP_LIMIT: i64 = 5;

/// Half-open calendar month `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl MonthRange {
    pub fn containing(t: OffsetDateTime) -> Self {
        let t = t.to_offset(UtcOffset::UTC).replace_time(Time::MIDNIGHT);
        let start = t - Duration::days(i64::from(t.day()) - 1);
        let days = days_in_year_month(start.year(), start.month());
        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.start - Duration::days(1))
    }

    /// Short English month name, e.g. "Jan".
    pub fn label(&self) -> String {
        self.start.month().to_string().chars().take(3).collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub user_id: Uuid,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub logins_this_month: i64,
    pub notes_per_month: Vec<MonthCount>,
    pub top_contributors: Vec<Contributor>,
}

/// Sessions whose expiry lands in the current month. This stands in for
/// "logins" and over-counts sessions that straddle a month boundary.
pub async fn logins_this_month(store: &dyn Store, now: OffsetDateTime) -> anyhow::Result<i64> {
    let month = MonthRange::containing(now);
    store
        .count_sessions_expiring_between(month.start, month.end)
        .await
}

/// Note counts for the last `months_back` months, oldest first, current month last.
pub async fn notes_per_month(
    store: &dyn Store,
    now: OffsetDateTime,
    months_back: usize,
) -> anyhow::Result<Vec<MonthCount>> {
    let mut months = Vec::with_capacity(months_back);
    let mut month = MonthRange::containing(now);
    for _ in 0..months_back {
        months.push(month);
        month = month.previous();
    }
    months.reverse();

    let mut out = Vec::with_capacity(months.len());
    for m in months {
        let count = store.count_notes_created_between(m.start, m.end).await?;
        out.push(MonthCount {
            label: m.label(),
            count,
        });
    }
    Ok(out)
}

pub async fn top_contributors(store: &dyn Store, limit: i64) -> anyhow::Result<Vec<Contributor>> {
    let ranked = store.top_note_owners(limit).await?;
    let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();

    let names: HashMap<Uuid, String> = match store.find_users(&ids).await {
        Ok(users) => users
            .into_iter()
            .map(|u| (u.id, u.display_name().to_string()))
            .collect(),
        Err(e) => {
            warn!(error = %e, "could not resolve contributor names");
            HashMap::new()
        }
    };

    Ok(ranked
        .into_iter()
        .map(|(user_id, count)| Contributor {
            user_id,
            name: names
                .get(&user_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            count,
        })
        .collect())
}

pub async fn dashboard(store: &dyn Store, now: OffsetDateTime) -> anyhow::Result<Dashboard> {
    Ok(Dashboard {
        logins_this_month: logins_this_month(store, now).await?,
        notes_per_month: notes_per_month(store, now, DEFAULT_MONTHS_BACK).await?,
        top_contributors: top_contributors(store, DEFAULT_TOP_LIMIT).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{NewNote, NewUser, Role},
        store::MemoryStore,
    };
    use time::macros::datetime;

    async fn user(store: &MemoryStore, name: Option<&str>, email: &str, role: Role) -> Uuid {
        store
            .create_user(NewUser {
                name: name.map(Into::into),
                email: email.into(),
                password_hash: "x".into(),
                role,
            })
            .await
            .unwrap()
            .id
    }

    async fn note_at(store: &MemoryStore, owner: Uuid, at: OffsetDateTime) {
        store
            .insert_note(NewNote {
                user_id: owner,
                title: "t".into(),
                subject: "s".into(),
                content: "c".into(),
                created_at: at,
            })
            .await
            .unwrap();
    }

    #[test]
    fn month_ranges() {
        let m = MonthRange::containing(datetime!(2024-02-17 13:45 UTC));
        assert_eq!(m.start, datetime!(2024-02-01 0:00 UTC));
        assert_eq!(m.end, datetime!(2024-03-01 0:00 UTC));
        assert_eq!(m.label(), "Feb");

        let prev = MonthRange::containing(datetime!(2024-01-01 0:00 UTC)).previous();
        assert_eq!(prev.start, datetime!(2023-12-01 0:00 UTC));
        assert_eq!(prev.label(), "Dec");
    }

    #[test]
    fn month_of_offset_time_is_taken_in_utc() {
        let m = MonthRange::containing(datetime!(2024-03-01 01:00 +03:00));
        assert_eq!(m.start, datetime!(2024-02-01 0:00 UTC));
    }

    #[tokio::test]
    async fn six_months_oldest_first_with_bounds() {
        let store = MemoryStore::new();
        let u = user(&store, None, "u@example.com", Role::User).await;
        let now = datetime!(2024-03-15 12:00 UTC);

        note_at(&store, u, datetime!(2024-03-01 0:00 UTC)).await;
        note_at(&store, u, datetime!(2024-03-15 11:00 UTC)).await;
        note_at(&store, u, datetime!(2024-02-29 23:59:59 UTC)).await;
        note_at(&store, u, datetime!(2023-10-01 0:00 UTC)).await;
        note_at(&store, u, datetime!(2023-09-30 23:59 UTC)).await; // outside the window

        let months = notes_per_month(&store, now, 6).await.unwrap();
        let labels: Vec<&str> = months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, ["Oct", "Nov", "Dec", "Jan", "Feb", "Mar"]);
        let counts: Vec<i64> = months.iter().map(|m| m.count).collect();
        assert_eq!(counts, [1, 0, 0, 0, 1, 2]);
    }

    #[tokio::test]
    async fn logins_count_session_expiry_in_month() {
        let store = MemoryStore::new();
        let u = user(&store, None, "u@example.com", Role::User).await;
        let now = datetime!(2024-03-15 12:00 UTC);
        store.insert_session(u, datetime!(2024-03-31 23:00 UTC)).await.unwrap();
        store.insert_session(u, datetime!(2024-03-02 9:00 UTC)).await.unwrap();
        store.insert_session(u, datetime!(2024-04-01 0:00 UTC)).await.unwrap();
        store.insert_session(u, datetime!(2024-02-29 9:00 UTC)).await.unwrap();

        assert_eq!(logins_this_month(&store, now).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn top_contributors_rank_and_label() {
        let store = MemoryStore::new();
        let ada = user(&store, Some("Ada"), "ada@example.com", Role::User).await;
        let bob = user(&store, None, "bob@example.com", Role::User).await;
        let root = user(&store, Some("Root"), "root@example.com", Role::Admin).await;
        let t = datetime!(2024-03-01 0:00 UTC);
        for _ in 0..3 {
            note_at(&store, bob, t).await;
        }
        for _ in 0..2 {
            note_at(&store, ada, t).await;
        }
        note_at(&store, root, t).await;

        let top = top_contributors(&store, 5).await.unwrap();
        let view: Vec<(&str, i64)> = top.iter().map(|c| (c.name.as_str(), c.count)).collect();
        assert_eq!(view, [("bob@example.com", 3), ("Ada", 2), ("Root", 1)]);

        assert_eq!(top_contributors(&store, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dashboard_bundles_everything() {
        let store = MemoryStore::new();
        let now = datetime!(2024-03-15 12:00 UTC);
        let d = dashboard(&store, now).await.unwrap();
        assert_eq!(d.logins_this_month, 0);
        assert_eq!(d.notes_per_month.len(), DEFAULT_MONTHS_BACK);
        assert!(d.top_contributors.is_empty());

        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("loginsThisMonth").is_some());
        assert!(json.get("notesPerMonth").is_some());
    }
}
