//! Tests for db::factory and config loading - repository creation and configuration.

mod support;

use std::io::Write;
use std::str::FromStr;

use lms_booking::config::{AppConfig, ConfigError, CONFIG_ENV};
use lms_booking::db::factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
use lms_booking::db::RepositoryError;

#[test]
fn test_repository_type_from_str_postgres() {
    let rt = RepositoryType::from_str("postgres").unwrap();
    assert_eq!(rt, RepositoryType::Postgres);

    let rt = RepositoryType::from_str("POSTGRES").unwrap();
    assert_eq!(rt, RepositoryType::Postgres);

    let rt = RepositoryType::from_str("pg").unwrap();
    assert_eq!(rt, RepositoryType::Postgres);
}

#[test]
fn test_repository_type_from_str_local() {
    let rt = RepositoryType::from_str("local").unwrap();
    assert_eq!(rt, RepositoryType::Local);

    let rt = RepositoryType::from_str("LOCAL").unwrap();
    assert_eq!(rt, RepositoryType::Local);
}

#[test]
fn test_repository_type_from_str_invalid() {
    let result = RepositoryType::from_str("invalid");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Unknown repository type"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
        ],
        || {
            let rt = RepositoryType::from_env();
            assert_eq!(rt, RepositoryType::Local);
        },
    );
}

#[test]
fn test_repository_type_from_env_with_database_url() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", Some("postgres://localhost/test")),
        ],
        || {
            let rt = RepositoryType::from_env();
            assert_eq!(rt, RepositoryType::Postgres);
        },
    );
}

#[test]
fn test_repository_type_explicit_env_wins() {
    support::with_scoped_env(
        &[
            ("REPOSITORY_TYPE", Some("local")),
            ("DATABASE_URL", Some("postgres://localhost/test")),
        ],
        || {
            assert_eq!(RepositoryType::from_env(), RepositoryType::Local);
        },
    );
}

#[test]
fn test_load_reads_lms_config_and_env_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[booking]\nslot_capacity = 4\nclosed_days = [0, 6]\n\n[server]\nport = 9100"
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = support::with_scoped_env(
        &[
            (CONFIG_ENV, Some(path.as_str())),
            ("REPOSITORY_TYPE", None),
            ("DATABASE_URL", None),
            ("PG_DATABASE_URL", None),
            ("HOST", None),
            ("PORT", Some("9200")),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.booking.slot_capacity, 4);
    assert_eq!(config.booking.closed_days, vec![0, 6]);
    assert_eq!(config.server.port, 9200);
    assert_eq!(config.repository_type().unwrap(), RepositoryType::Local);
}

#[test]
fn test_load_rejects_invalid_policy() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[booking]\nslot_capacity = 0").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let result = support::with_scoped_env(
        &[(CONFIG_ENV, Some(path.as_str())), ("REPOSITORY_TYPE", None)],
        AppConfig::load,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_with_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml").to_string_lossy().to_string();

    let result = support::with_scoped_env(&[(CONFIG_ENV, Some(path.as_str()))], AppConfig::load);
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[tokio::test]
async fn test_factory_from_default_config_is_healthy() {
    let repo = RepositoryFactory::from_config(&AppConfig::default())
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[tokio::test]
async fn test_builder_from_config() {
    let repo = RepositoryBuilder::new()
        .from_config(&AppConfig::default())
        .unwrap()
        .build()
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());
}

#[tokio::test]
async fn test_create_has_one_signature_for_every_backend_build() {
    let repo = RepositoryFactory::create(RepositoryType::Local, None)
        .await
        .unwrap();
    assert!(repo.health_check().await.unwrap());

    let err = RepositoryFactory::create(RepositoryType::Postgres, None)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[cfg(not(feature = "postgres-repo"))]
#[tokio::test]
async fn test_postgres_without_feature_is_configuration_error() {
    let mut config = AppConfig::default();
    config.repository.repo_type = "postgres".to_string();
    let err = RepositoryFactory::from_config(&config).await.err().unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}

#[cfg(feature = "postgres-repo")]
#[tokio::test]
async fn test_postgres_without_url_is_configuration_error() {
    let mut config = AppConfig::default();
    config.repository.repo_type = "postgres".to_string();
    config.postgres.database_url.clear();
    let err = RepositoryFactory::from_config(&config).await.err().unwrap();
    assert!(matches!(err, RepositoryError::ConfigurationError { .. }));
}
