#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::{CountingHook, RecordingOperations, sample_mapping};
use figment::{
    Figment, Jail,
    providers::{Env, Format, Yaml},
};
use modkit_repository::{
    DialectKind, RepositoryConfig, RepositoryError, ResolutionSource, Role, SqlOperations,
    StackAssembler, StackOverrides,
};

fn load(jail_file: &str) -> Figment {
    Figment::new()
        .merge(Yaml::file(jail_file))
        .merge(Env::prefixed("APP__").split("__"))
}

#[test]
fn yaml_dsn_becomes_dialect_override() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "app.yaml",
            r#"
repository:
  dsn: "mysql://root@localhost/shop"
"#,
        )?;

        let config = RepositoryConfig::load(&load("app.yaml")).unwrap();
        assert_eq!(config.dialect_kind().unwrap(), Some(DialectKind::MySql));

        let ops = RecordingOperations::sqlite();
        let operations: Arc<dyn SqlOperations> = ops.clone();
        let hook = CountingHook::new();
        let stack = StackAssembler::new()
            .with_hook(hook.clone())
            .assemble(
                StackOverrides::from_config(&config)
                    .unwrap()
                    .with_mapping_context(sample_mapping())
                    .with_operations(operations),
            )
            .unwrap();

        assert_eq!(stack.dialect().name(), "mysql");
        assert_eq!(ops.probes(), 0);
        assert_eq!(hook.source_of(Role::Dialect), Some(ResolutionSource::Override));
        Ok(())
    });
}

#[test]
fn env_overrides_yaml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "app.yaml",
            r#"
repository:
  dialect: postgres
"#,
        )?;
        jail.set_env("APP__REPOSITORY__DIALECT", "sqlite");

        let config = RepositoryConfig::load(&load("app.yaml")).unwrap();
        assert_eq!(config.dialect, Some(DialectKind::Sqlite));
        Ok(())
    });
}

#[test]
fn missing_section_detects_at_assembly() {
    Jail::expect_with(|jail| {
        jail.create_file("app.yaml", "server:\n  port: 8080\n")?;

        let config = RepositoryConfig::load(&load("app.yaml")).unwrap();
        assert_eq!(config, RepositoryConfig::default());

        let ops = RecordingOperations::new("PostgreSQL");
        let operations: Arc<dyn SqlOperations> = ops.clone();
        let stack = StackAssembler::new()
            .assemble(
                StackOverrides::from_config(&config)
                    .unwrap()
                    .with_mapping_context(sample_mapping())
                    .with_operations(operations),
            )
            .unwrap();

        assert_eq!(stack.dialect().name(), "postgres");
        assert_eq!(ops.probes(), 1);
        Ok(())
    });
}

#[test]
fn conflicting_config_is_rejected_before_assembly() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "app.yaml",
            r#"
repository:
  dialect: postgres
  dsn: "sqlite::memory:"
"#,
        )?;

        let config = RepositoryConfig::load(&load("app.yaml")).unwrap();
        let err = StackOverrides::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InvalidOverride {
                role: Role::Dialect,
                ..
            }
        ));
        Ok(())
    });
}
