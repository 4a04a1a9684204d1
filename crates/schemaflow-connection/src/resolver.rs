//! Connection resolution.
//!
//! Resolves a database's `{value | valueFrom}` connection spec to a
//! concrete URI. Precedence: literal value, then static secret
//! reference, then the dynamic-secret backend. A literal value never
//! triggers network I/O.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use schema_core::{Database, SecretKeyRef, VaultConnection};
use schemaflow_cluster::ClusterClient;
use schemaflow_vault::{VaultClient, template};

use crate::error::{ResolverError, ResolverResult};

/// The outcome of one resolution.
#[derive(Debug, Clone)]
pub struct ResolvedConnection {
    /// The connection URI to hand to a phase pod.
    pub uri: String,
    /// Present only for dynamically minted credentials.
    pub lease: Option<VaultLease>,
}

/// Raw backend token and lease info, for callers that need the secret
/// itself rather than the rendered URI.
#[derive(Debug, Clone)]
pub struct VaultLease {
    pub client_token: String,
    pub lease_duration: u64,
}

/// Resolves connection specs against the object store and the secrets
/// backend. Stateless: concurrent calls are safe but not deduplicated.
pub struct ConnectionResolver {
    cluster: Arc<dyn ClusterClient>,
}

impl ConnectionResolver {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Resolve a database's connection spec to a usable URI.
    pub async fn resolve_connection_uri(
        &self,
        database: &Database,
    ) -> ResolverResult<ResolvedConnection> {
        let connection = &database.spec.connection;

        if let Some(value) = &connection.value {
            if !value.is_empty() {
                return Ok(ResolvedConnection {
                    uri: value.clone(),
                    lease: None,
                });
            }
        }

        let value_from = connection
            .value_from
            .as_ref()
            .ok_or(ResolverError::EmptyConnectionSpec)?;

        if let Some(secret_ref) = &value_from.secret_key_ref {
            return self.from_secret(&database.namespace, secret_ref).await;
        }

        if let Some(vault) = &value_from.vault {
            return self.from_vault(database, vault).await;
        }

        Err(ResolverError::UnsupportedValueFrom)
    }

    async fn from_secret(
        &self,
        namespace: &str,
        secret_ref: &SecretKeyRef,
    ) -> ResolverResult<ResolvedConnection> {
        let secret = self
            .cluster
            .get_secret(namespace, &secret_ref.name)
            .await?
            .ok_or_else(|| ResolverError::SecretNotFound {
                namespace: namespace.to_string(),
                name: secret_ref.name.clone(),
            })?;

        let value = secret
            .data
            .get(&secret_ref.key)
            .ok_or_else(|| ResolverError::SecretKeyMissing {
                namespace: namespace.to_string(),
                name: secret_ref.name.clone(),
                key: secret_ref.key.clone(),
            })?;

        Ok(ResolvedConnection {
            uri: String::from_utf8_lossy(value).into_owned(),
            lease: None,
        })
    }

    async fn from_vault(
        &self,
        database: &Database,
        vault: &VaultConnection,
    ) -> ResolverResult<ResolvedConnection> {
        let jwt = self
            .cluster
            .service_account_token(&database.namespace)
            .await?;

        let client = VaultClient::new(&vault.endpoint);
        let token = client.login(&vault.role, &jwt).await?;
        let creds = client.dynamic_credentials(&token, &vault.secret).await?;

        // Template source selection: an inline template wins; otherwise
        // the backend's stored configuration for the database resource
        // name (not the secret name) supplies it.
        let connection_template = match &vault.connection_template {
            Some(inline) => inline.clone(),
            None => client.stored_connection_url(&token, &database.name).await?,
        };

        let values = HashMap::from([
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
        ]);
        let uri = template::render(&connection_template, &values)?;

        debug!(
            database = %database.name,
            driver = %database.spec.driver,
            lease = creds.lease_duration,
            "rendered dynamic connection uri"
        );

        Ok(ResolvedConnection {
            uri,
            lease: Some(VaultLease {
                client_token: token,
                lease_duration: creds.lease_duration,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use schema_core::{DatabaseSpec, Secret, ValueFrom, ValueOrValueFrom};
    use schemaflow_cluster::MemoryCluster;

    const LOGIN_BODY: &str = r#"{"auth": {"client_token": "blah"}}"#;
    const CREDS_BODY: &str = r#"{
        "lease_duration": 86400,
        "data": {"username": "someuser", "password": "p@ssw0rd"}
    }"#;
    const CONFIG_BODY: &str = r#"{
        "data": {
            "connection_details": {
                "connection_url": "postgresql://{{ .username }}:{{ .password }}@postgresql:5432/schema"
            }
        }
    }"#;

    /// Canned-response backend fake, one JSON body per path.
    async fn spawn_fake_backend(routes: Vec<(&'static str, &'static str)>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    loop {
                        let n = match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }

                    let head = String::from_utf8_lossy(&buf);
                    let path = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("")
                        .to_string();

                    let response = match routes.iter().find(|(p, _)| *p == path) {
                        Some((_, body)) => format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n".to_string(),
                    };
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn database(connection: ValueOrValueFrom) -> Database {
        Database {
            name: "db_name".to_string(),
            namespace: "default".to_string(),
            spec: DatabaseSpec {
                driver: "postgres".to_string(),
                connection,
            },
        }
    }

    fn vault_spec(endpoint: &str, connection_template: Option<&str>) -> ValueOrValueFrom {
        ValueOrValueFrom {
            value: None,
            value_from: Some(ValueFrom {
                secret_key_ref: None,
                vault: Some(VaultConnection {
                    endpoint: endpoint.to_string(),
                    role: "schemaflow".to_string(),
                    secret: "secret".to_string(),
                    connection_template: connection_template.map(str::to_string),
                }),
            }),
        }
    }

    #[tokio::test]
    async fn literal_value_wins_without_network_calls() {
        let cluster = MemoryCluster::new();
        let resolver = ConnectionResolver::new(Arc::new(cluster.clone()));

        // Even with a valueFrom present, a non-empty value is returned
        // verbatim and nothing else is consulted.
        let db = database(ValueOrValueFrom {
            value: Some("postgresql://literal@db/x".to_string()),
            value_from: Some(ValueFrom {
                secret_key_ref: Some(SecretKeyRef {
                    name: "unused".to_string(),
                    key: "uri".to_string(),
                }),
                vault: None,
            }),
        });

        let resolved = resolver.resolve_connection_uri(&db).await.unwrap();
        assert_eq!(resolved.uri, "postgresql://literal@db/x");
        assert!(resolved.lease.is_none());
        assert!(cluster.ops().await.is_empty());
    }

    #[tokio::test]
    async fn empty_spec_is_a_configuration_error() {
        let resolver = ConnectionResolver::new(Arc::new(MemoryCluster::new()));

        let db = database(ValueOrValueFrom::default());
        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::EmptyConnectionSpec));

        // An empty string value does not count as a literal.
        let db = database(ValueOrValueFrom {
            value: Some(String::new()),
            value_from: None,
        });
        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::EmptyConnectionSpec));
    }

    #[tokio::test]
    async fn value_from_without_variant_is_unsupported() {
        let resolver = ConnectionResolver::new(Arc::new(MemoryCluster::new()));

        let db = database(ValueOrValueFrom {
            value: None,
            value_from: Some(ValueFrom::default()),
        });
        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedValueFrom));
    }

    #[tokio::test]
    async fn secret_ref_reads_secret_in_database_namespace() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_secret(Secret {
                name: "appdb-conn".to_string(),
                namespace: "default".to_string(),
                data: BTreeMap::from([(
                    "uri".to_string(),
                    b"postgresql://fromsecret@db/x".to_vec(),
                )]),
            })
            .await;
        let resolver = ConnectionResolver::new(Arc::new(cluster));

        let db = database(ValueOrValueFrom {
            value: None,
            value_from: Some(ValueFrom {
                secret_key_ref: Some(SecretKeyRef {
                    name: "appdb-conn".to_string(),
                    key: "uri".to_string(),
                }),
                vault: None,
            }),
        });

        let resolved = resolver.resolve_connection_uri(&db).await.unwrap();
        assert_eq!(resolved.uri, "postgresql://fromsecret@db/x");
    }

    #[tokio::test]
    async fn missing_secret_is_not_found_not_generic() {
        let resolver = ConnectionResolver::new(Arc::new(MemoryCluster::new()));

        let db = database(ValueOrValueFrom {
            value: None,
            value_from: Some(ValueFrom {
                secret_key_ref: Some(SecretKeyRef {
                    name: "nope".to_string(),
                    key: "uri".to_string(),
                }),
                vault: None,
            }),
        });

        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::SecretNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_secret_key_is_distinct() {
        let cluster = MemoryCluster::new();
        cluster
            .insert_secret(Secret {
                name: "appdb-conn".to_string(),
                namespace: "default".to_string(),
                data: BTreeMap::new(),
            })
            .await;
        let resolver = ConnectionResolver::new(Arc::new(cluster));

        let db = database(ValueOrValueFrom {
            value: None,
            value_from: Some(ValueFrom {
                secret_key_ref: Some(SecretKeyRef {
                    name: "appdb-conn".to_string(),
                    key: "uri".to_string(),
                }),
                vault: None,
            }),
        });

        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::SecretKeyMissing { .. }));
    }

    #[tokio::test]
    async fn inline_template_wins_over_backend_config() {
        // The backend serves a stored config too; the inline template
        // must win and the config path must never be hit.
        let endpoint = spawn_fake_backend(vec![
            ("/v1/auth/kubernetes/login", LOGIN_BODY),
            ("/v1/database/creds/secret", CREDS_BODY),
            ("/v1/database/config/db_name", r#"{"data": {"connection_details": {"connection_url": "mysql://{{ .username }}@stored/x"}}}"#),
        ])
        .await;

        let cluster = MemoryCluster::new();
        cluster.set_service_account_token("default", "sa-jwt").await;
        let resolver = ConnectionResolver::new(Arc::new(cluster));

        let db = database(vault_spec(
            &endpoint,
            Some("postgresql://{{ .username }}:{{ .password }}@postgresql:5432/schema"),
        ));

        let resolved = resolver.resolve_connection_uri(&db).await.unwrap();
        assert_eq!(
            resolved.uri,
            "postgresql://someuser:p@ssw0rd@postgresql:5432/schema"
        );
        let lease = resolved.lease.unwrap();
        assert_eq!(lease.client_token, "blah");
        assert_eq!(lease.lease_duration, 86400);
    }

    #[tokio::test]
    async fn backend_template_is_fetched_when_no_inline_template() {
        let endpoint = spawn_fake_backend(vec![
            ("/v1/auth/kubernetes/login", LOGIN_BODY),
            ("/v1/database/creds/secret", CREDS_BODY),
            ("/v1/database/config/db_name", CONFIG_BODY),
        ])
        .await;

        let cluster = MemoryCluster::new();
        cluster.set_service_account_token("default", "sa-jwt").await;
        let resolver = ConnectionResolver::new(Arc::new(cluster));

        let db = database(vault_spec(&endpoint, None));

        let resolved = resolver.resolve_connection_uri(&db).await.unwrap();
        assert_eq!(
            resolved.uri,
            "postgresql://someuser:p@ssw0rd@postgresql:5432/schema"
        );
    }

    #[tokio::test]
    async fn vault_path_requires_service_account_token() {
        let endpoint = spawn_fake_backend(vec![
            ("/v1/auth/kubernetes/login", LOGIN_BODY),
            ("/v1/database/creds/secret", CREDS_BODY),
        ])
        .await;

        // No token seeded for the namespace.
        let resolver = ConnectionResolver::new(Arc::new(MemoryCluster::new()));
        let db = database(vault_spec(&endpoint, Some("postgresql://{{ .username }}@db/x")));

        let err = resolver.resolve_connection_uri(&db).await.unwrap_err();
        assert!(matches!(err, ResolverError::Cluster(_)));
    }
}
