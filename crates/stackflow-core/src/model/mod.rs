//! Model definitions

mod service;
mod stack;

// Re-exports
pub use service::*;
pub use stack::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stack() {
        let stack = StackSpec::new("shop");
        assert_eq!(stack.repository_name(), "shop");
        assert_eq!(stack.network.cidr, "10.0.0.0/16");
        assert!(stack.service.public);

        let names: Vec<&str> = stack
            .service
            .containers
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["app", "nginx"]);

        let target = stack.service.target_container().unwrap();
        assert_eq!(target.name, "nginx");
        assert_eq!(target.port, Some(80));
    }

    #[test]
    fn test_target_container_falls_back_to_first_port() {
        let service = ServiceSpec {
            listener: ListenerSpec {
                container: None,
                ..Default::default()
            },
            containers: vec![
                ContainerSpec::new("worker"),
                ContainerSpec::new("web").with_port(8080),
            ],
            ..Default::default()
        };
        assert_eq!(service.target_container().unwrap().name, "web");
    }

    #[test]
    fn test_dns_fqdn() {
        let dns = DnsSpec {
            zone: "example.com".to_string(),
            record: Some("shop".to_string()),
        };
        assert_eq!(dns.fqdn(), "shop.example.com");

        let apex = DnsSpec {
            zone: "example.com".to_string(),
            record: None,
        };
        assert_eq!(apex.fqdn(), "example.com");
    }
}
