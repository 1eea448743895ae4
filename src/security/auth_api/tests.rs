#[cfg(test)]
mod tests {
    use super::super::types::*;
    use super::super::*;
    use axum::http::StatusCode;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn test_default_role_permissions() {
        let table = RolePermissions::default();

        assert!(table.allows(Role::Admin, Permission::ManageTickets));
        assert!(table.allows(Role::Admin, Permission::ManageUsers));
        assert!(table.allows(Role::Admin, Permission::Delete));
        assert!(!table.allows(Role::Admin, Permission::Triage));

        assert!(table.allows(Role::Agent, Permission::Assign));
        assert!(table.allows(Role::Agent, Permission::Triage));
        assert!(!table.allows(Role::Agent, Permission::Delete));
        assert!(!table.allows(Role::Agent, Permission::ManageTickets));

        assert!(table.allows(Role::User, Permission::Create));
        assert!(table.allows(Role::User, Permission::Read));
        assert!(!table.allows(Role::User, Permission::Update));
        assert!(!table.allows(Role::User, Permission::Assign));
    }

    #[test]
    fn test_custom_table_missing_role_grants_nothing() {
        let mut map = BTreeMap::new();
        map.insert(Role::Admin, BTreeSet::from([Permission::ManageTickets]));
        let table = RolePermissions::new(map);

        assert!(table.allows(Role::Admin, Permission::ManageTickets));
        assert!(!table.allows(Role::Agent, Permission::Read));
        assert!(table.permissions_for(Role::User).is_empty());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" agent ".parse::<Role>(), Ok(Role::Agent));
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
        assert!(Role::Agent.is_staff());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_authenticated_user_permissions() {
        let table = RolePermissions::default();
        let admin = AuthenticatedUser::new(uuid::Uuid::new_v4(), "admin", Role::Admin)
            .with_email("admin@example.com");

        assert_eq!(admin.role, Role::Admin);
        assert!(admin.has_permission(&table, Permission::ManageUsers));
        assert_eq!(admin.email.as_deref(), Some("admin@example.com"));

        let user = AuthenticatedUser::new(uuid::Uuid::new_v4(), "user", Role::User);
        assert!(!user.has_permission(&table, Permission::ManageUsers));
        assert!(require_permission(&user, &table, Permission::ManageUsers).is_err());
        assert!(require_permission(&admin, &table, Permission::ManageUsers).is_ok());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InternalError("db".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_permission_serialization() {
        let json = serde_json::to_string(&Permission::ManageTickets).expect("serialize");
        assert_eq!(json, "\"manage_tickets\"");
        assert_eq!(Permission::ManageTickets.as_str(), "manage_tickets");
    }
}
