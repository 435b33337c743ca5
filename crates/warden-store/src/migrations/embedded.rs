/// An embedded migration
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations in application order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_oplog",
            sql: include_str!("../../migrations/001_oplog.sql"),
        },
        Migration {
            id: "002_resource_tables",
            sql: include_str!("../../migrations/002_resource_tables.sql"),
        },
    ]
}
