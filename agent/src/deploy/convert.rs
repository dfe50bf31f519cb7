//! Conversion from a record's application template to a scheduler application

use std::collections::BTreeMap;

use control_api::{
    AppTemplate, ContainerTemplate, DockerTemplate, FetchTemplate, HealthCheckTemplate,
    PortMappingTemplate, UpgradeStrategyTemplate, VolumeTemplate,
};
use scheduler_api::{
    Application, Command, Container, Docker, Fetch, HealthCheck, Parameter, PortMapping,
    UpgradeStrategy, Volume,
};

/// Maps a template field by field. Empty collections and blank strings become
/// absent fields so the scheduler applies its own defaults. `instances` is
/// left unset; the deployer fills it from the record.
pub fn to_scheduler_application(template: &AppTemplate) -> Application {
    Application {
        id: template.id.clone(),
        cmd: template.cmd.clone().and_then(non_blank),
        args: non_empty(template.args.clone()),
        constraints: non_empty(
            template
                .constraints
                .iter()
                .map(|c| c.constraint.clone())
                .collect(),
        ),
        container: template.container.as_ref().map(container),
        cpus: template.cpus,
        mem: template.mem,
        disk: template.disk,
        env: non_empty_map(template.env.clone()),
        executor: template.executor.clone().and_then(non_blank),
        health_checks: non_empty(template.health_checks.iter().map(health_check).collect()),
        ports: non_empty(template.ports.clone()),
        require_ports: template.require_ports,
        backoff_seconds: template.backoff_seconds,
        backoff_factor: template.backoff_factor,
        max_launch_delay_seconds: template.max_launch_delay_seconds,
        dependencies: non_empty(template.dependencies.clone()),
        user: non_blank(template.user.clone()),
        upgrade_strategy: template.upgrade_strategy.as_ref().map(upgrade_strategy),
        uris: non_empty(template.uris.clone()),
        labels: non_empty_map(template.labels.clone()),
        accepted_resource_roles: non_empty(template.accepted_resource_roles.clone()),
        fetch: non_empty(template.fetch.iter().map(fetch).collect()),
        ..Default::default()
    }
}

fn container(template: &ContainerTemplate) -> Container {
    Container {
        container_type: non_blank(template.container_type.clone()),
        docker: template.docker.as_ref().map(docker),
        volumes: non_empty(template.volumes.iter().map(volume).collect()),
    }
}

fn docker(template: &DockerTemplate) -> Docker {
    Docker {
        image: template.image.clone(),
        network: non_blank(template.network.clone()),
        force_pull_image: template.force_pull_image,
        privileged: template.privileged,
        parameters: non_empty(
            template
                .parameters
                .iter()
                .map(|p| Parameter {
                    key: p.key.clone(),
                    value: p.value.clone(),
                })
                .collect(),
        ),
        port_mappings: non_empty(template.port_mappings.iter().map(port_mapping).collect()),
    }
}

fn port_mapping(template: &PortMappingTemplate) -> PortMapping {
    PortMapping {
        container_port: template.container_port,
        host_port: template.host_port,
        service_port: template.service_port,
        protocol: non_blank(template.protocol.clone()),
    }
}

fn volume(template: &VolumeTemplate) -> Volume {
    Volume {
        container_path: template.container_path.clone(),
        host_path: non_blank(template.host_path.clone()),
        mode: non_blank(template.mode.clone()),
    }
}

fn health_check(template: &HealthCheckTemplate) -> HealthCheck {
    HealthCheck {
        command: template
            .command
            .clone()
            .and_then(non_blank)
            .map(|value| Command { value }),
        port_index: template.port_index,
        path: template.path.clone().and_then(non_blank),
        max_consecutive_failures: template.max_consecutive_failures,
        protocol: non_blank(template.protocol.clone()),
        grace_period_seconds: positive(template.grace_period_seconds),
        interval_seconds: positive(template.interval_seconds),
        timeout_seconds: positive(template.timeout_seconds),
    }
}

fn upgrade_strategy(template: &UpgradeStrategyTemplate) -> UpgradeStrategy {
    UpgradeStrategy {
        minimum_health_capacity: template.minimum_health_capacity,
        maximum_over_capacity: template.maximum_over_capacity,
    }
}

fn fetch(template: &FetchTemplate) -> Fetch {
    Fetch {
        uri: template.uri.clone(),
        executable: template.executable,
        extract: template.extract,
        cache: template.cache,
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn non_empty_map(values: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!values.is_empty()).then_some(values)
}

fn non_blank(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn positive(value: i32) -> Option<i32> {
    (value > 0).then_some(value)
}
