use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::UserStore;
use crate::security::AuthenticatedUser;

use super::error::TicketsError;
use super::lifecycle::{apply_update, create_ticket};
use super::policy::TicketAccessPolicy;
use super::query::build_list_filter;
use super::storage::TicketStore;
use super::types::{
    CreateTicketRequest, Ticket, TicketField, TicketStats, TicketUpdate, UpdateTicketRequest,
};

/// Runs each ticket operation end to end: fetch, policy check, mutation
/// and persistence.
pub struct TicketService {
    store: Arc<dyn TicketStore>,
    users: Arc<dyn UserStore>,
    policy: Arc<TicketAccessPolicy>,
    validate_assignee_role: bool,
}

impl TicketService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        users: Arc<dyn UserStore>,
        policy: Arc<TicketAccessPolicy>,
        validate_assignee_role: bool,
    ) -> Self {
        Self {
            store,
            users,
            policy,
            validate_assignee_role,
        }
    }

    pub fn policy(&self) -> &TicketAccessPolicy {
        &self.policy
    }

    async fn fetch(&self, id: Uuid) -> Result<Ticket, TicketsError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(TicketsError::ticket_not_found)
    }

    pub async fn create(
        &self,
        caller: &AuthenticatedUser,
        req: CreateTicketRequest,
    ) -> Result<Ticket, TicketsError> {
        if !self.policy.can_create(caller) {
            warn!("User {} may not create tickets", caller.user_id);
            return Err(TicketsError::Forbidden(
                "Not authorized to create tickets".into(),
            ));
        }

        let ticket = create_ticket(caller, req, Utc::now())?;
        let ticket = self.store.insert(ticket).await?;
        info!("Ticket {} created by {}", ticket.id, caller.user_id);
        Ok(ticket)
    }

    pub async fn list(&self, caller: &AuthenticatedUser) -> Result<Vec<Ticket>, TicketsError> {
        let filter = build_list_filter(self.policy.permissions(), caller);
        debug!("Listing tickets for {} with {filter:?}", caller.user_id);
        self.store.find(filter).await
    }

    pub async fn get(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<Ticket, TicketsError> {
        let ticket = self.fetch(id).await?;
        if !self.policy.can_view(caller, &ticket) {
            warn!("User {} denied view of ticket {id}", caller.user_id);
            return Err(TicketsError::Forbidden(
                "Not authorized to view this ticket".into(),
            ));
        }
        Ok(ticket)
    }

    async fn check_assignee(&self, assignee: Uuid) -> Result<(), TicketsError> {
        match self.users.find_by_id(assignee).await? {
            Some(user) if user.role.is_staff() && user.is_active => Ok(()),
            Some(_) => Err(TicketsError::Validation(
                "Tickets can only be assigned to an active agent or admin".into(),
            )),
            None => Err(TicketsError::Validation(format!(
                "Assignee {assignee} does not exist"
            ))),
        }
    }

    pub async fn update(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
        req: UpdateTicketRequest,
    ) -> Result<Ticket, TicketsError> {
        let ticket = self.fetch(id).await?;
        let update = TicketUpdate::try_from(req)?;

        let decision = self
            .policy
            .can_update(caller, &ticket, &update.requested_fields());
        if !decision.allowed {
            warn!("User {} denied update of ticket {id}", caller.user_id);
            return Err(TicketsError::Forbidden(
                "Not authorized to update this ticket".into(),
            ));
        }

        let skipped: Vec<TicketField> = update
            .requested_fields()
            .difference(&decision.granted)
            .copied()
            .collect();
        if !skipped.is_empty() {
            debug!(
                "Ignoring fields {skipped:?} from {} on ticket {id}",
                caller.user_id
            );
        }

        if self.validate_assignee_role && decision.grants(TicketField::AssignedTo) {
            if let Some(assignee) = update.assigned_to {
                self.check_assignee(assignee).await?;
            }
        }

        let next = apply_update(&self.policy, caller, &ticket, &update, Utc::now())?;
        if next == ticket {
            debug!("Update of ticket {id} changed nothing");
            return Ok(ticket);
        }

        let saved = self.store.save(next).await?;
        info!(
            "Ticket {id} updated by {} (status {}, version {})",
            caller.user_id, saved.status, saved.version
        );
        Ok(saved)
    }

    pub async fn delete(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<(), TicketsError> {
        let ticket = self.fetch(id).await?;
        if !self.policy.can_delete(caller, &ticket) {
            warn!("User {} denied delete of ticket {id}", caller.user_id);
            return Err(TicketsError::Forbidden(
                "Not authorized to delete this ticket".into(),
            ));
        }

        if !self.store.delete_by_id(id).await? {
            return Err(TicketsError::ticket_not_found());
        }
        info!("Ticket {id} deleted by {}", caller.user_id);
        Ok(())
    }

    pub async fn stats(&self, caller: &AuthenticatedUser) -> Result<TicketStats, TicketsError> {
        let filter = build_list_filter(self.policy.permissions(), caller);
        self.store.count_by_status(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryUserStore, User};
    use crate::security::{Role, RolePermissions};
    use crate::tickets::policy::{DeletePolicy, UpdatePolicy};
    use crate::tickets::storage::InMemoryTicketStore;
    use crate::tickets::query::TicketFilter;
    use crate::tickets::types::TicketStatus;

    struct Fixture {
        service: TicketService,
        users: Arc<InMemoryUserStore>,
    }

    fn fixture(delete: DeletePolicy) -> Fixture {
        let users = Arc::new(InMemoryUserStore::new());
        let policy = TicketAccessPolicy::new(
            Arc::new(RolePermissions::default()),
            delete,
            UpdatePolicy::Relationship,
        );
        let service = TicketService::new(
            Arc::new(InMemoryTicketStore::new()),
            users.clone(),
            Arc::new(policy),
            true,
        );
        Fixture { service, users }
    }

    async fn account(fx: &Fixture, name: &str, role: Role) -> AuthenticatedUser {
        let user = fx
            .users
            .insert(User::new(name, format!("{name}@example.com"), "hash", role))
            .await
            .expect("insert user");
        AuthenticatedUser::new(user.id, user.username, user.role)
    }

    fn new_ticket(title: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            title: Some(title.into()),
            description: Some("Details".into()),
            priority: Some("high".into()),
        }
    }

    fn assign_to(id: Uuid) -> UpdateTicketRequest {
        UpdateTicketRequest {
            assigned_to: Some(id.to_string()),
            ..UpdateTicketRequest::default()
        }
    }

    #[tokio::test]
    async fn test_claim_flow_bumps_version() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let user = account(&fx, "reporter", Role::User).await;
        let agent = account(&fx, "agent_a", Role::Agent).await;

        let ticket = fx.service.create(&user, new_ticket("Printer")).await.expect("create");
        let claimed = fx
            .service
            .update(&agent, ticket.id, assign_to(agent.user_id))
            .await
            .expect("claim");

        assert_eq!(claimed.assigned_to, Some(agent.user_id));
        assert_eq!(claimed.status, TicketStatus::InProgress);
        assert_eq!(claimed.version, 2);
    }

    #[tokio::test]
    async fn test_assignee_must_be_staff() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let admin = account(&fx, "admin", Role::Admin).await;
        let user = account(&fx, "reporter", Role::User).await;

        let ticket = fx.service.create(&user, new_ticket("Wifi")).await.expect("create");

        let err = fx
            .service
            .update(&admin, ticket.id, assign_to(user.user_id))
            .await
            .expect_err("user cannot be assignee");
        assert!(matches!(err, TicketsError::Validation(_)));

        let err = fx
            .service
            .update(&admin, ticket.id, assign_to(Uuid::new_v4()))
            .await
            .expect_err("unknown assignee");
        assert!(matches!(err, TicketsError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_missing_and_forbidden() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let owner = account(&fx, "owner", Role::User).await;
        let other = account(&fx, "other", Role::User).await;

        let err = fx
            .service
            .get(&owner, Uuid::new_v4())
            .await
            .expect_err("missing");
        assert!(matches!(err, TicketsError::NotFound(_)));

        let ticket = fx.service.create(&owner, new_ticket("Mine")).await.expect("create");
        let err = fx.service.get(&other, ticket.id).await.expect_err("hidden");
        assert!(matches!(err, TicketsError::Forbidden(_)));
        assert!(fx.service.get(&owner, ticket.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_policies() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let admin = account(&fx, "admin", Role::Admin).await;
        let owner = account(&fx, "owner", Role::User).await;
        let ticket = fx.service.create(&owner, new_ticket("Old")).await.expect("create");

        let err = fx.service.delete(&owner, ticket.id).await.expect_err("admin only");
        assert!(matches!(err, TicketsError::Forbidden(_)));
        fx.service.delete(&admin, ticket.id).await.expect("admin deletes");
        assert!(matches!(
            fx.service.delete(&admin, ticket.id).await,
            Err(TicketsError::NotFound(_))
        ));

        let lenient = fixture(DeletePolicy::AdminOrCreator);
        let owner = account(&lenient, "owner", Role::User).await;
        let ticket = lenient
            .service
            .create(&owner, new_ticket("Old"))
            .await
            .expect("create");
        lenient
            .service
            .delete(&owner, ticket.id)
            .await
            .expect("creator deletes");
    }

    #[tokio::test]
    async fn test_noop_update_does_not_write() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let owner = account(&fx, "owner", Role::User).await;
        let ticket = fx.service.create(&owner, new_ticket("Same")).await.expect("create");

        let req = UpdateTicketRequest {
            priority: Some("high".into()),
            ..UpdateTicketRequest::default()
        };
        let first = fx
            .service
            .update(&owner, ticket.id, req.clone())
            .await
            .expect("update");
        let second = fx.service.update(&owner, ticket.id, req).await.expect("update");

        assert_eq!(first, second);
        assert_eq!(second.version, 1);
    }

    #[tokio::test]
    async fn test_stats_follow_visibility() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let admin = account(&fx, "admin", Role::Admin).await;
        let agent = account(&fx, "agent_a", Role::Agent).await;
        let u1 = account(&fx, "user_one", Role::User).await;
        let u2 = account(&fx, "user_two", Role::User).await;

        fx.service.create(&u1, new_ticket("One")).await.expect("create");
        let two = fx.service.create(&u2, new_ticket("Two")).await.expect("create");
        fx.service
            .update(&agent, two.id, assign_to(agent.user_id))
            .await
            .expect("claim");
        let three = fx.service.create(&u2, new_ticket("Three")).await.expect("create");
        let close = UpdateTicketRequest {
            status: Some("closed".into()),
            ..UpdateTicketRequest::default()
        };
        fx.service.update(&u2, three.id, close).await.expect("close");

        let all = fx.service.stats(&admin).await.expect("stats");
        assert_eq!(all.total, 3);
        assert_eq!(all.closed, 1);

        let agent_view = fx.service.stats(&agent).await.expect("stats");
        assert_eq!(agent_view.total, 2);
        assert_eq!(agent_view.open, 1);
        assert_eq!(agent_view.in_progress, 1);

        let u1_view = fx.service.stats(&u1).await.expect("stats");
        assert_eq!(u1_view.total, 1);
    }

    /// Serves reads of existing tickets from memory; every listing and
    /// write fails as if the database had gone away.
    struct FailingStore {
        inner: InMemoryTicketStore,
    }

    fn db_down() -> TicketsError {
        TicketsError::Storage("connection refused".into())
    }

    #[async_trait::async_trait]
    impl TicketStore for FailingStore {
        async fn find(&self, _filter: TicketFilter) -> Result<Vec<Ticket>, TicketsError> {
            Err(db_down())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, TicketsError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, _ticket: Ticket) -> Result<Ticket, TicketsError> {
            Err(db_down())
        }

        async fn save(&self, _ticket: Ticket) -> Result<Ticket, TicketsError> {
            Err(db_down())
        }

        async fn delete_by_id(&self, _id: Uuid) -> Result<bool, TicketsError> {
            Err(db_down())
        }
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_storage_errors() {
        let fx = fixture(DeletePolicy::AdminOnly);
        let admin = account(&fx, "admin", Role::Admin).await;
        let user = account(&fx, "reporter", Role::User).await;

        let seeded = create_ticket(&user, new_ticket("Scanner"), Utc::now()).expect("valid");
        let inner = InMemoryTicketStore::new();
        inner.insert(seeded.clone()).await.expect("seed");
        let store = Arc::new(FailingStore { inner });
        let service = TicketService::new(
            store.clone(),
            fx.users.clone(),
            Arc::new(TicketAccessPolicy::new(
                Arc::new(RolePermissions::default()),
                DeletePolicy::AdminOnly,
                UpdatePolicy::Relationship,
            )),
            true,
        );

        let err = service
            .create(&user, new_ticket("Another"))
            .await
            .expect_err("insert fails");
        assert!(matches!(err, TicketsError::Storage(_)));

        let err = service.list(&admin).await.expect_err("find fails");
        assert!(matches!(err, TicketsError::Storage(_)));

        let err = service.stats(&admin).await.expect_err("find fails");
        assert!(matches!(err, TicketsError::Storage(_)));

        let escalate = UpdateTicketRequest {
            priority: Some("low".into()),
            comment: Some("Bumping".into()),
            ..UpdateTicketRequest::default()
        };
        let err = service
            .update(&admin, seeded.id, escalate)
            .await
            .expect_err("save fails");
        assert!(matches!(err, TicketsError::Storage(_)));

        let err = service
            .delete(&admin, seeded.id)
            .await
            .expect_err("delete fails");
        assert!(matches!(err, TicketsError::Storage(_)));

        let stored = store
            .inner
            .find_by_id(seeded.id)
            .await
            .expect("read")
            .expect("still present");
        assert_eq!(stored, seeded);
    }
}
