//! CLI commands implementation

use anyhow::Result;
use rpclb_balancer::{Balancer, RoundRobinBalancer};
use rpclb_client::{BasicFactory, Connection};
use rpclb_core::{BalancerConfig, BalancerEvent, EventKind};
use rpclb_naming::StaticResolver;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

type CliBalancer = RoundRobinBalancer<BasicFactory<()>>;

/// Event line printed by `watch`
#[derive(Debug, Serialize)]
pub struct EventLine {
    pub event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BalancerEvent> for EventLine {
    fn from(event: &BalancerEvent) -> Self {
        let (addresses, error) = match event {
            BalancerEvent::Ready => (None, None),
            BalancerEvent::Change(addresses) => (Some(addresses.clone()), None),
            BalancerEvent::Error(e) => (None, Some(e.to_string())),
        };
        Self {
            event: event.kind(),
            addresses,
            error,
        }
    }
}

fn build_balancer(config: &BalancerConfig) -> CliBalancer {
    let resolver = StaticResolver::new(config.addresses.clone());
    RoundRobinBalancer::new(Arc::new(resolver), BasicFactory::unit())
}

/// Bring every backend up and print the selection sequence
pub async fn pick(config: &BalancerConfig, calls: usize) -> Result<()> {
    if config.addresses.is_empty() {
        anyhow::bail!("No backend addresses configured for '{}'", config.target);
    }

    let balancer = build_balancer(config);
    balancer.start(&config.target)?;
    balancer.wait_for_ready().await?;

    for address in balancer.addresses() {
        balancer.up(&address)?;
    }
    info!(target = %config.target, backends = balancer.len(), "Backends up");

    for call in 0..calls {
        match balancer.get() {
            Ok(client) => println!("{:>4} {}", call, client.address()),
            Err(e) if e.is_retryable() => {
                warn!(call = call, error = %e, "Selection failed, skipping call");
                println!("{:>4} -", call);
            }
            Err(e) => {
                let _ = balancer.close().await;
                return Err(e.into());
            }
        }
    }

    balancer.close().await?;
    Ok(())
}

/// Print membership events as JSON lines until Ctrl-C
pub async fn watch(config: &BalancerConfig) -> Result<()> {
    let balancer = build_balancer(config);

    for kind in [EventKind::Ready, EventKind::Change, EventKind::Error] {
        balancer.on(kind, |event| match serde_json::to_string(&EventLine::from(event)) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to encode event: {}", e),
        });
    }

    balancer.start(&config.target)?;
    tokio::signal::ctrl_c().await?;

    info!(target = %config.target, "Interrupted, closing balancer");
    balancer.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpclb_core::LbError;

    #[test]
    fn test_event_line_json() {
        let line = EventLine::from(&BalancerEvent::Change(vec!["10.0.0.1:50051".to_string()]));
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"event":"change","addresses":["10.0.0.1:50051"]}"#
        );

        let line = EventLine::from(&BalancerEvent::Error(LbError::UnknownUpdateOperation(
            "MODIFY".to_string(),
        )));
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"event":"error","error":"unknown update op, MODIFY"}"#
        );
    }

    #[tokio::test]
    async fn test_pick_round_robins_static_addresses() {
        let config = BalancerConfig {
            target: "greeter".to_string(),
            addresses: vec!["10.0.0.1:50051".to_string(), "10.0.0.2:50051".to_string()],
        };
        pick(&config, 4).await.unwrap();
    }

    #[tokio::test]
    async fn test_pick_requires_addresses() {
        let config = BalancerConfig::default();
        assert!(pick(&config, 1).await.is_err());
    }
}
