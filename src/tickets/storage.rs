use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::shared::schema::{ticket_comments, tickets};
use crate::core::shared::utils::DbPool;

use super::error::TicketsError;
use super::query::{sort_newest_first, TicketFilter};
use super::types::{Ticket, TicketComment, TicketStats, TicketStatus};

/// Ticket persistence. `save` is a compare-and-swap on `version`: it fails
/// with `Conflict` when the stored ticket moved on since it was read, and
/// returns the ticket with the bumped version otherwise.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Matching tickets, newest first.
    async fn find(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, TicketsError>;
    async fn insert(&self, ticket: Ticket) -> Result<Ticket, TicketsError>;
    async fn save(&self, ticket: Ticket) -> Result<Ticket, TicketsError>;
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, TicketsError>;

    async fn count_by_status(&self, filter: TicketFilter) -> Result<TicketStats, TicketsError> {
        let tickets = self.find(filter).await?;
        Ok(tickets.into_iter().map(|t| t.status).collect())
    }
}

fn stale_write(id: Uuid) -> TicketsError {
    TicketsError::Conflict(format!(
        "Ticket {id} was modified by another request; reload and try again"
    ))
}

#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<Uuid, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn find(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError> {
        let tickets = self.tickets.read().await;
        let mut found: Vec<Ticket> = tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, TicketsError> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn insert(&self, ticket: Ticket) -> Result<Ticket, TicketsError> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(TicketsError::Conflict(format!(
                "Ticket {} already exists",
                ticket.id
            )));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn save(&self, mut ticket: Ticket) -> Result<Ticket, TicketsError> {
        let mut tickets = self.tickets.write().await;
        let stored = tickets
            .get(&ticket.id)
            .ok_or_else(TicketsError::ticket_not_found)?;
        if stored.version != ticket.version {
            return Err(stale_write(ticket.id));
        }
        ticket.version += 1;
        tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, TicketsError> {
        Ok(self.tickets.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tickets)]
#[diesel(treat_none_as_null = true)]
pub struct DbTicket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = ticket_comments)]
pub struct DbTicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub position: i32,
    pub text: String,
    pub posted_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Ticket> for DbTicket {
    fn from(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            status: ticket.status.as_str().to_string(),
            priority: ticket.priority.as_str().to_string(),
            created_by: ticket.created_by,
            assigned_to: ticket.assigned_to,
            version: ticket.version,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }
}

fn comment_rows(ticket: &Ticket, from: usize) -> Vec<DbTicketComment> {
    ticket
        .comments
        .iter()
        .enumerate()
        .skip(from)
        .map(|(position, c)| DbTicketComment {
            id: c.id,
            ticket_id: ticket.id,
            position: position as i32,
            text: c.text.clone(),
            posted_by: c.posted_by,
            created_at: c.created_at,
        })
        .collect()
}

fn into_ticket(row: DbTicket, comments: Vec<DbTicketComment>) -> Result<Ticket, TicketsError> {
    Ok(Ticket {
        id: row.id,
        title: row.title,
        description: row.description,
        status: row.status.parse().map_err(TicketsError::Storage)?,
        priority: row.priority.parse().map_err(TicketsError::Storage)?,
        created_by: row.created_by,
        assigned_to: row.assigned_to,
        comments: comments
            .into_iter()
            .map(|c| TicketComment {
                id: c.id,
                text: c.text,
                posted_by: c.posted_by,
                created_at: c.created_at,
            })
            .collect(),
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn load_comments(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<DbTicketComment>>, TicketsError> {
    let rows: Vec<DbTicketComment> = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq_any(ids))
        .order((ticket_comments::ticket_id, ticket_comments::position.asc()))
        .select(DbTicketComment::as_select())
        .load(conn)?;

    let mut grouped: HashMap<Uuid, Vec<DbTicketComment>> = HashMap::new();
    for row in rows {
        grouped.entry(row.ticket_id).or_default().push(row);
    }
    Ok(grouped)
}

fn filtered(filter: TicketFilter) -> tickets::BoxedQuery<'static, diesel::pg::Pg> {
    let query = tickets::table.into_boxed();
    match filter {
        TicketFilter::All => query,
        TicketFilter::AssignedOrOpen(user_id) => query.filter(
            tickets::assigned_to
                .eq(user_id)
                .or(tickets::status.eq(TicketStatus::Open.as_str()).nullable()),
        ),
        TicketFilter::CreatedBy(user_id) => query.filter(tickets::created_by.eq(user_id)),
    }
}

pub struct PgTicketStore {
    pool: DbPool,
}

impl PgTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, TicketsError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, TicketsError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| TicketsError::Storage(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e: tokio::task::JoinError| TicketsError::Storage(e.to_string()))?
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn find(&self, filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError> {
        self.run(move |conn| {
            let rows: Vec<DbTicket> = filtered(filter)
                .order(tickets::created_at.desc())
                .select(DbTicket::as_select())
                .load(conn)?;

            let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            let mut comments = load_comments(conn, &ids)?;

            rows.into_iter()
                .map(|row| {
                    let own = comments.remove(&row.id).unwrap_or_default();
                    into_ticket(row, own)
                })
                .collect()
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, TicketsError> {
        self.run(move |conn| {
            let Some(row) = tickets::table
                .find(id)
                .select(DbTicket::as_select())
                .first::<DbTicket>(conn)
                .optional()?
            else {
                return Ok(None);
            };
            let comments = load_comments(conn, &[id])?.remove(&id).unwrap_or_default();
            into_ticket(row, comments).map(Some)
        })
        .await
    }

    async fn insert(&self, ticket: Ticket) -> Result<Ticket, TicketsError> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                diesel::insert_into(tickets::table)
                    .values(&DbTicket::from(&ticket))
                    .execute(conn)?;
                let comments = comment_rows(&ticket, 0);
                if !comments.is_empty() {
                    diesel::insert_into(ticket_comments::table)
                        .values(&comments)
                        .execute(conn)?;
                }
                Ok::<_, TicketsError>(())
            })?;
            Ok(ticket)
        })
        .await
    }

    async fn save(&self, ticket: Ticket) -> Result<Ticket, TicketsError> {
        self.run(move |conn| {
            conn.transaction::<_, TicketsError, _>(|conn| {
                let mut row = DbTicket::from(&ticket);
                row.version = ticket.version + 1;

                let updated = diesel::update(
                    tickets::table
                        .filter(tickets::id.eq(ticket.id))
                        .filter(tickets::version.eq(ticket.version)),
                )
                .set(&row)
                .execute(conn)?;

                if updated == 0 {
                    let exists: i64 = tickets::table
                        .filter(tickets::id.eq(ticket.id))
                        .count()
                        .get_result(conn)?;
                    return Err(if exists == 0 {
                        TicketsError::ticket_not_found()
                    } else {
                        stale_write(ticket.id)
                    });
                }

                let stored: i64 = ticket_comments::table
                    .filter(ticket_comments::ticket_id.eq(ticket.id))
                    .count()
                    .get_result(conn)?;
                let fresh = comment_rows(&ticket, stored as usize);
                if !fresh.is_empty() {
                    diesel::insert_into(ticket_comments::table)
                        .values(&fresh)
                        .execute(conn)?;
                }

                let mut saved = ticket;
                saved.version = row.version;
                Ok(saved)
            })
        })
        .await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, TicketsError> {
        self.run(move |conn| {
            let deleted = diesel::delete(tickets::table.find(id))
                .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn count_by_status(&self, filter: TicketFilter) -> Result<TicketStats, TicketsError> {
        self.run(move |conn| {
            let statuses: Vec<String> = filtered(filter)
                .select(tickets::status)
                .load(conn)?;
            statuses
                .iter()
                .map(|s| s.parse::<TicketStatus>().map_err(TicketsError::Storage))
                .collect()
        })
        .await
    }
}
