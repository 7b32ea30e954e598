// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn sink(prefix: &str) -> SinkConfig {
    SinkConfig {
        kind: "s3".into(),
        bucket: "tenant-state".into(),
        prefix: prefix.into(),
        provider: None,
        endpoint: None,
        region: Some("us-east-1".into()),
        access_key: None,
        secret_key: None,
        extra_args: vec![],
    }
}

#[parameterized(
    plain = { "a/b", "a/b" },
    doubled = { "a//b///c", "a/b/c" },
    trailing = { "a/b/", "a/b" },
    leading = { "/a", "a" },
    empty = { "", "" },
)]
fn slash_normalization(input: &str, expected: &str) {
    assert_eq!(normalize_slashes(input), expected);
}

#[test]
fn remote_path_interpolates_tenant() {
    let tenant = TenantId::new("t-42");
    let path = S3Adapter.remote_path(&sink("notebooks/${tenantId}"), &tenant, "work");
    assert_eq!(path, ":s3:tenant-state/notebooks/t-42/work");
}

#[test]
fn remote_path_without_prefix() {
    let tenant = TenantId::new("t-42");
    let path = S3Adapter.remote_path(&sink(""), &tenant, "/work/");
    assert_eq!(path, ":s3:tenant-state/work");
}

#[test]
fn rclone_args_with_explicit_credentials() {
    let mut s = sink("p");
    s.provider = Some("Minio".into());
    s.endpoint = Some("http://minio:9000".into());
    s.access_key = Some("AK".into());
    s.secret_key = Some("SK".into());
    let args = S3Adapter.rclone_args(&s);
    assert_eq!(
        args,
        vec![
            "--s3-provider",
            "Minio",
            "--s3-endpoint",
            "http://minio:9000",
            "--s3-region",
            "us-east-1",
            "--s3-access-key-id",
            "AK",
            "--s3-secret-access-key",
            "SK",
        ]
    );
}

#[test]
fn rclone_args_fall_back_to_env_auth() {
    let args = S3Adapter.rclone_args(&sink("p"));
    assert!(args.contains(&"--s3-env-auth".to_string()));
    assert!(!args.iter().any(|a| a == "--s3-access-key-id"));
}

#[test]
fn registry_resolves_builtin_and_custom() {
    let mut registry = SinkRegistry::with_builtins();
    assert!(registry.get("s3").is_ok());
    assert!(matches!(registry.get("gcs"), Err(SyncError::UnknownSink(_))));

    struct Fake;
    impl SinkAdapter for Fake {
        fn remote_path(&self, _: &SinkConfig, _: &TenantId, path: &str) -> String {
            format!(":fake:{path}")
        }
        fn rclone_args(&self, _: &SinkConfig) -> Vec<String> {
            vec![]
        }
    }
    registry.register("fake", Arc::new(Fake));
    let adapter = registry.get("fake").unwrap();
    assert_eq!(adapter.remote_path(&sink(""), &TenantId::new("t"), "x"), ":fake:x");
}
