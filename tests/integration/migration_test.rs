//! Schema application through the coordinator

use lighter_data::testing::{self, notes};
use lighter_data::{Coordinator, DataError, ExecutionContext, MigrationError};
use sea_orm::sea_query::{Alias, ColumnDef, Table};
use sea_orm::{ConnectionTrait, DbBackend, Statement};

mod migrator {
    use sea_orm_migration::prelude::*;

    pub struct Migrator;

    #[async_trait::async_trait]
    impl MigratorTrait for Migrator {
        fn migrations() -> Vec<Box<dyn MigrationTrait>> {
            vec![Box::new(Migration)]
        }
    }

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .if_not_exists()
                        .table(Tags::Table)
                        .col(ColumnDef::new(Tags::Id).integer().not_null().primary_key())
                        .col(ColumnDef::new(Tags::Label).string().not_null())
                        .take(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().if_exists().table(Tags::Table).take())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Tags {
        Table,
        Id,
        Label,
    }
}

async fn table_exists(coordinator: &Coordinator, name: &str) -> bool {
    coordinator
        .query_one(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            [sea_orm::Value::from(name)],
        ))
        .await
        .unwrap()
        .is_some()
}

#[tokio::test]
async fn test_migrate_creates_tables() {
    let coordinator = testing::coordinator().await;

    let labels = Table::create()
        .table(Alias::new("labels"))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
        .to_owned();

    coordinator
        .migrate(&[coordinator.schema_for(notes::Entity), labels])
        .await
        .unwrap();

    assert!(table_exists(&coordinator, "notes").await);
    assert!(table_exists(&coordinator, "labels").await);
}

#[tokio::test]
async fn test_failed_statement_rolls_back_whole_batch() {
    let coordinator = testing::coordinator().await;

    let first = Table::create()
        .table(Alias::new("first_table"))
        .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
        .to_owned();
    // a table without columns is rejected by the store
    let broken = Table::create().table(Alias::new("broken")).to_owned();

    let result = coordinator.migrate(&[first, broken]).await;

    assert!(matches!(result, Err(MigrationError::Apply { index: 1, .. })));
    assert!(!table_exists(&coordinator, "first_table").await);
}

#[tokio::test]
async fn test_migrate_inside_scope_joins_transaction() {
    let coordinator = testing::coordinator().await;
    let ctx = ExecutionContext::background();

    let result: Result<(), MigrationError> = coordinator
        .with_transaction(&ctx, |scoped| async move {
            let scoped_table = Table::create()
                .table(Alias::new("scoped_table"))
                .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
                .to_owned();
            scoped.migrate(&[scoped_table]).await?;
            Err(MigrationError::Migrator(sea_orm::DbErr::Custom("abandon".to_string())))
        })
        .await;

    assert!(result.is_err());
    assert!(!table_exists(&coordinator, "scoped_table").await);
}

#[tokio::test]
async fn test_run_migrator_is_idempotent() {
    let coordinator = testing::coordinator().await;

    coordinator.run_migrator::<migrator::Migrator>().await.unwrap();
    coordinator.run_migrator::<migrator::Migrator>().await.unwrap();

    assert!(table_exists(&coordinator, "tags").await);

    let applied = coordinator
        .query_all(Statement::from_string(
            DbBackend::Sqlite,
            "SELECT version FROM seaql_migrations",
        ))
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
}

#[tokio::test]
async fn test_migration_errors_convert_to_data_error() {
    let coordinator = testing::coordinator().await;
    let broken = Table::create().table(Alias::new("broken")).to_owned();

    let result: Result<(), DataError> = async {
        coordinator.migrate(&[broken]).await?;
        Ok(())
    }
    .await;

    assert!(matches!(result, Err(DataError::Migration(MigrationError::Apply { index: 0, .. }))));
}
