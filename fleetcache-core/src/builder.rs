//! Entity graph builder.
//!
//! Turns one server group plus its instances into records across the
//! application, cluster, server-group and instance namespaces, with each
//! side of every relationship recorded on its own record.

use crate::{
    ApplicationAttributes, ClusterAttributes, EntityGraph, InstanceDescription, Keys, Namespace,
    RecordAttributes, ServerGroupDescription,
};

/// Build the entity graph for a single server group.
///
/// An empty `instances` slice yields a server-group record with no instance
/// relationships and an empty instance namespace.
pub fn build_server_group_graph(
    keys: &Keys,
    server_group: &ServerGroupDescription,
    instances: &[InstanceDescription],
) -> EntityGraph {
    let application_key = keys.application(&server_group.application);
    let cluster_key = keys.cluster(
        &server_group.application,
        &server_group.cluster,
        &server_group.account,
    );
    let server_group_key = keys.server_group(
        &server_group.name,
        &server_group.region,
        &server_group.account,
    );
    let load_balancer_key = server_group.load_balancer.as_deref().map(|load_balancer| {
        keys.load_balancer(
            &server_group.application,
            load_balancer,
            &server_group.region,
            &server_group.account,
        )
    });
    let instance_keys: Vec<String> = instances
        .iter()
        .map(|instance| {
            keys.instance(
                &server_group.name,
                &instance.name,
                &server_group.region,
                &server_group.account,
            )
        })
        .collect();

    let mut graph = EntityGraph::new();

    {
        let application = graph
            .index_mut(Namespace::Applications)
            .get_or_create(&application_key, || {
                RecordAttributes::Application(ApplicationAttributes {
                    name: server_group.application.clone(),
                })
            });
        application
            .relate(Namespace::Clusters, cluster_key.as_str())
            .relate(Namespace::ServerGroups, server_group_key.as_str());
        if let Some(load_balancer_key) = &load_balancer_key {
            application.relate(Namespace::LoadBalancers, load_balancer_key.as_str());
        }
    }

    {
        let cluster = graph
            .index_mut(Namespace::Clusters)
            .get_or_create(&cluster_key, || {
                RecordAttributes::Cluster(ClusterAttributes {
                    name: server_group.cluster.clone(),
                    account_name: server_group.account.clone(),
                })
            });
        cluster
            .relate(Namespace::Applications, application_key.as_str())
            .relate(Namespace::ServerGroups, server_group_key.as_str());
        if let Some(load_balancer_key) = &load_balancer_key {
            cluster.relate(Namespace::LoadBalancers, load_balancer_key.as_str());
        }
    }

    {
        let record = graph
            .index_mut(Namespace::ServerGroups)
            .get_or_create(&server_group_key, || {
                RecordAttributes::ServerGroup(Box::new(server_group.clone()))
            });
        record
            .relate(Namespace::Applications, application_key.as_str())
            .relate(Namespace::Clusters, cluster_key.as_str());
        if let Some(load_balancer_key) = &load_balancer_key {
            record.relate(Namespace::LoadBalancers, load_balancer_key.as_str());
        }
        for instance_key in &instance_keys {
            record.relate(Namespace::Instances, instance_key.as_str());
        }
    }

    let index = graph.index_mut(Namespace::Instances);
    for (instance, instance_key) in instances.iter().zip(&instance_keys) {
        index
            .get_or_create(instance_key, || {
                RecordAttributes::Instance(Box::new(instance.clone()))
            })
            .relate(Namespace::ServerGroups, server_group_key.as_str());
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HealthState;
    use chrono::DateTime;

    fn keys() -> Keys {
        Keys::new("azure")
    }

    fn description(load_balancer: Option<&str>) -> ServerGroupDescription {
        ServerGroupDescription {
            name: "app-v001".to_string(),
            account: "my-acct".to_string(),
            region: "eastus".to_string(),
            application: "app".to_string(),
            cluster: "app".to_string(),
            load_balancer: load_balancer.map(str::to_string),
            last_read_time: DateTime::from_timestamp_millis(1000).expect("valid millis"),
            extensions: Default::default(),
        }
    }

    #[test]
    fn test_builds_all_four_namespaces() {
        let instances = vec![
            InstanceDescription::new("vm-0", HealthState::Up),
            InstanceDescription::new("vm-1", HealthState::Down),
        ];
        let graph = build_server_group_graph(&keys(), &description(Some("app-lb")), &instances);

        let k = keys();
        let app_key = k.application("app");
        let cluster_key = k.cluster("app", "app", "my-acct");
        let sg_key = k.server_group("app-v001", "eastus", "my-acct");
        let lb_key = k.load_balancer("app", "app-lb", "eastus", "my-acct");

        let application = graph.get(Namespace::Applications, &app_key).expect("app");
        assert!(application.is_related(Namespace::Clusters, &cluster_key));
        assert!(application.is_related(Namespace::ServerGroups, &sg_key));
        assert!(application.is_related(Namespace::LoadBalancers, &lb_key));

        let cluster = graph.get(Namespace::Clusters, &cluster_key).expect("cluster");
        assert!(cluster.is_related(Namespace::Applications, &app_key));
        assert!(cluster.is_related(Namespace::ServerGroups, &sg_key));
        assert_eq!(
            cluster.attributes,
            RecordAttributes::Cluster(ClusterAttributes {
                name: "app".to_string(),
                account_name: "my-acct".to_string(),
            })
        );

        let sg = graph.get(Namespace::ServerGroups, &sg_key).expect("server group");
        assert_eq!(sg.related(Namespace::Instances).map(|s| s.len()), Some(2));
        assert!(sg.is_related(Namespace::LoadBalancers, &lb_key));
        match &sg.attributes {
            RecordAttributes::ServerGroup(resource) => assert_eq!(resource.name, "app-v001"),
            other => panic!("unexpected attributes {:?}", other),
        }

        assert_eq!(graph.len(Namespace::Instances), 2);
        for instance in graph.index(Namespace::Instances).expect("instances").iter() {
            assert!(instance.is_related(Namespace::ServerGroups, &sg_key));
        }
    }

    #[test]
    fn test_empty_instance_list() {
        let graph = build_server_group_graph(&keys(), &description(None), &[]);
        let sg_key = keys().server_group("app-v001", "eastus", "my-acct");
        let sg = graph.get(Namespace::ServerGroups, &sg_key).expect("server group");
        assert!(sg.related(Namespace::Instances).is_none());
        assert!(sg.related(Namespace::LoadBalancers).is_none());
        assert_eq!(graph.len(Namespace::Instances), 0);
        assert!(!graph.is_empty());
    }

    #[test]
    fn test_builder_is_deterministic() {
        let instances = vec![InstanceDescription::new("vm-0", HealthState::Up)];
        let a = build_server_group_graph(&keys(), &description(Some("lb")), &instances);
        let b = build_server_group_graph(&keys(), &description(Some("lb")), &instances);
        assert_eq!(a, b);
    }
}
