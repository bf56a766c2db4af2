//! Discovery round trips against the recording host
//!
//! Run with: cargo test --test discovery

mod fixtures;

use fixtures::{LoopbackServer, Reply, ReplyOptions, ScriptedExchange};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wireprobe::discovery::{DiscoveryCoordinator, ProbeState};
use wireprobe::host::{HostCall, RecordingHost};
use wireprobe::protocol::{MacAddr, Route};
use wireprobe::telemetry::ProbeMetrics;
use wireprobe::transport::{Exchange, RetrySchedule, Transport, UdpExchange};

const ENDPOINT: Ipv4Addr = Ipv4Addr::new(168, 63, 129, 16);
const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

fn mac() -> MacAddr {
    "00:0d:3a:12:34:56".parse().unwrap()
}

fn endpoint_path() -> PathBuf {
    PathBuf::from("/var/lib/waagent/WireServer")
}

fn coordinator<E: Exchange>(host: RecordingHost, exchange: E) -> DiscoveryCoordinator<RecordingHost, E> {
    let transport = Transport::new(
        exchange,
        RetrySchedule::new(vec![Duration::ZERO; 5]),
        Arc::new(ProbeMetrics::new()),
    );
    DiscoveryCoordinator::new(host, transport, endpoint_path(), Duration::ZERO)
}

fn full_reply() -> ReplyOptions {
    ReplyOptions::new()
        .endpoint(ENDPOINT)
        .router(GATEWAY)
        .routes(&[
            (Ipv4Addr::new(10, 1, 0, 0), 16, GATEWAY),
            (Ipv4Addr::new(192, 168, 7, 0), 24, Ipv4Addr::new(10, 0, 0, 2)),
        ])
}

#[test]
fn test_probe_installs_routes_and_persists_endpoint() {
    let host = RecordingHost::new("eth0", mac());
    let mut coordinator = coordinator(host, ScriptedExchange::new([Reply::Answer(full_reply())]));

    let discovery = coordinator.probe().unwrap().expect("discovery");

    assert_eq!(coordinator.state(), ProbeState::Resolved);
    assert_eq!(discovery.endpoint(), Some(ENDPOINT));
    assert_eq!(discovery.gateway(), Some(GATEWAY));
    assert_eq!(
        coordinator.host().calls(),
        vec![
            HostCall::WriteEndpointFile {
                path: endpoint_path(),
                value: "168.63.129.16".into(),
            },
            HostCall::AddRoute {
                network: Ipv4Addr::UNSPECIFIED,
                mask: Ipv4Addr::UNSPECIFIED,
                gateway: GATEWAY,
            },
            HostCall::AddRoute {
                network: Ipv4Addr::new(10, 1, 0, 0),
                mask: Ipv4Addr::new(255, 255, 0, 0),
                gateway: GATEWAY,
            },
            HostCall::AddRoute {
                network: Ipv4Addr::new(192, 168, 7, 0),
                mask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(10, 0, 0, 2),
            },
        ]
    );
    assert_eq!(coordinator.metrics().routes_installed.get(), 3);
}

#[test]
fn test_unknown_options_are_skipped() {
    let opts = ReplyOptions::new()
        .raw(53, &[2])
        .endpoint(ENDPOINT)
        .raw(12, b"guest-vm")
        .router(GATEWAY)
        .raw(51, &[0, 1, 81, 128])
        .routes(&[(Ipv4Addr::new(172, 16, 0, 0), 12, GATEWAY)])
        .raw(252, &[]);
    let mut coordinator = coordinator(
        RecordingHost::new("eth0", mac()),
        ScriptedExchange::new([Reply::Answer(opts)]),
    );

    let discovery = coordinator.probe().unwrap().expect("discovery");
    assert_eq!(discovery.endpoint(), Some(ENDPOINT));
    assert_eq!(discovery.gateway(), Some(GATEWAY));
    assert_eq!(
        discovery.routes(),
        &[Route::new(Ipv4Addr::new(172, 16, 0, 0), 12, GATEWAY)]
    );
}

#[test]
fn test_silent_network_uses_every_attempt() {
    let mut coordinator = coordinator(RecordingHost::new("eth0", mac()), ScriptedExchange::new([]));

    assert!(coordinator.probe().unwrap().is_none());
    assert_eq!(coordinator.state(), ProbeState::Failed);
    assert_eq!(coordinator.transport().exchange().requests.len(), 5);
    assert!(coordinator.host().calls().is_empty());
}

#[test]
fn test_foreign_response_ends_probe() {
    let mut coordinator = coordinator(
        RecordingHost::new("eth0", mac()),
        ScriptedExchange::new([Reply::Foreign(full_reply()), Reply::Answer(full_reply())]),
    );

    assert!(coordinator.probe().unwrap().is_none());
    assert_eq!(coordinator.transport().exchange().requests.len(), 1);
    assert_eq!(coordinator.metrics().responses_rejected.get(), 1);
    assert!(coordinator.host().installed_routes().is_empty());
}

#[test]
fn test_answer_after_timeouts() {
    let mut coordinator = coordinator(
        RecordingHost::new("eth0", mac()),
        ScriptedExchange::new([Reply::Silence, Reply::Silence, Reply::Answer(full_reply())]),
    );

    assert!(coordinator.probe().unwrap().is_some());
    assert_eq!(coordinator.metrics().timeouts.get(), 2);
    assert_eq!(coordinator.metrics().requests_sent.get(), 3);
}

#[test]
fn test_second_probe_replaces_snapshot() {
    let second = ReplyOptions::new().endpoint(Ipv4Addr::new(168, 63, 129, 17));
    let mut coordinator = coordinator(
        RecordingHost::new("eth0", mac()),
        ScriptedExchange::new([Reply::Answer(full_reply()), Reply::Answer(second)]),
    );

    let first = coordinator.probe().unwrap().expect("first discovery");
    let latest = coordinator.probe().unwrap().expect("second discovery");

    // Earlier readers keep their view
    assert_eq!(first.endpoint(), Some(ENDPOINT));
    assert_eq!(first.routes().len(), 2);
    assert_eq!(latest.endpoint(), Some(Ipv4Addr::new(168, 63, 129, 17)));
    assert_eq!(latest.gateway(), None);
    assert!(Arc::ptr_eq(&coordinator.current().unwrap(), &latest));
}

#[test]
fn test_failed_probe_keeps_previous_snapshot() {
    let mut coordinator = coordinator(
        RecordingHost::new("eth0", mac()),
        ScriptedExchange::new([Reply::Answer(full_reply())]),
    );

    let first = coordinator.probe().unwrap().expect("discovery");
    assert!(coordinator.probe().unwrap().is_none());

    assert_eq!(coordinator.state(), ProbeState::Failed);
    assert!(Arc::ptr_eq(&coordinator.current().unwrap(), &first));
    assert_eq!(coordinator.endpoint(), Some(ENDPOINT));
}

#[test]
fn test_hooks_surround_exchange_on_isolated_host() {
    let host = RecordingHost::new("eth1", mac())
        .with_default_route(false)
        .with_dhcp_service_active(true)
        .with_link_after(2);
    let mut coordinator = coordinator(host, ScriptedExchange::new([Reply::Answer(ReplyOptions::new())]));

    let discovery = coordinator.probe().unwrap().expect("discovery");
    assert_eq!(discovery.endpoint(), None);
    assert_eq!(
        coordinator.host().calls(),
        vec![
            HostCall::BringInterfaceUp,
            HostCall::BringInterfaceUp,
            HostCall::AddBroadcastHostRoute("eth1".into()),
            HostCall::StopDhcpService,
            HostCall::StartDhcpService,
            HostCall::RemoveBroadcastHostRoute("eth1".into()),
        ]
    );
}

#[test]
fn test_hooks_undone_when_no_response() {
    let host = RecordingHost::new("eth0", mac())
        .with_default_route(false)
        .with_dhcp_service_active(true);
    let mut coordinator = coordinator(host, ScriptedExchange::new([]));

    assert!(coordinator.probe().unwrap().is_none());
    assert_eq!(
        coordinator.host().calls(),
        vec![
            HostCall::AddBroadcastHostRoute("eth0".into()),
            HostCall::StopDhcpService,
            HostCall::StartDhcpService,
            HostCall::RemoveBroadcastHostRoute("eth0".into()),
        ]
    );
}

#[test]
fn test_probe_over_loopback_udp() {
    let server = LoopbackServer::spawn(full_reply());
    let exchange = UdpExchange::with_addresses(
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        server.addr,
        Duration::from_secs(5),
    );
    let mut coordinator = coordinator(RecordingHost::new("eth0", mac()), exchange);

    let discovery = coordinator.probe().unwrap().expect("discovery");

    assert_eq!(server.join(), 300);
    assert_eq!(discovery.endpoint(), Some(ENDPOINT));
    assert_eq!(coordinator.host().installed_routes().len(), 3);
}
