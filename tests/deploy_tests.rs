// Integration tests for the compile-slice-deploy pipeline, end to end
// against the mock session backend.
use firelet::session::MockBackend;
use firelet::{loader, Orchestrator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("write fixture");
}

fn two_host_repo() -> TempDir {
    let repo = TempDir::new().expect("temp repo dir");
    write(
        repo.path(),
        "hosts.csv",
        "gw eth0 10.0.0.1 1\nweb eth0 10.0.0.2 1\n",
    );
    write(
        repo.path(),
        "rules.csv",
        "y allow-web gw:eth0 * web:eth0 http ACCEPT 0 \"\"\n",
    );
    write(repo.path(), "services.csv", "http TCP 80\n");
    repo
}

#[tokio::test]
async fn compile_and_slice_are_consistent_for_a_two_host_repo() {
    let repo = two_host_repo();
    let fireset = loader::load_fireset(repo.path()).expect("load fireset");

    let directives = firelet::compile(&fireset).expect("compile");
    assert_eq!(directives.len(), 1);
    assert!(directives[0].contains("--dport 80"));

    let sliced = firelet::compile_per_host(&fireset).expect("slice");
    assert_eq!(sliced["gw"]["eth0"].len(), 1);
    assert_eq!(sliced["web"]["eth0"].len(), 1);
}

#[tokio::test]
async fn deploy_succeeds_when_both_hosts_have_fixtures() {
    let repo = two_host_repo();
    let fireset = loader::load_fireset(repo.path()).expect("load fireset");

    for (host, addr) in [("gw", "10.0.0.1"), ("web", "10.0.0.2")] {
        write(repo.path(), &format!("iptables-save-{host}"), "*filter\nCOMMIT\n");
        write(
            repo.path(),
            &format!("ip-addr-show-{host}"),
            &format!("1: lo\n2: eth0: <UP>\n    inet {addr}/24 scope global eth0\n"),
        );
    }

    let backend = Arc::new(MockBackend::new(repo.path().to_path_buf()));
    let orchestrator = Orchestrator::new(
        backend,
        "firelet".to_string(),
        Duration::from_secs(5),
        Duration::from_secs(30),
    );

    let statuses = orchestrator.deploy(&fireset).await.expect("deploy");
    for (host, status) in &statuses {
        assert_eq!(
            status,
            &firelet::HostStatus::Ok,
            "expected host {host} to deploy cleanly, got {status:?}"
        );
    }

    let delivered = std::fs::read_to_string(repo.path().join("iptables-save-gw")).unwrap();
    assert!(delivered.contains("--dport 80"));
}

#[tokio::test]
async fn deploy_isolates_a_single_missing_fixture() {
    let repo = two_host_repo();
    let fireset = loader::load_fireset(repo.path()).expect("load fireset");

    // Only "gw" gets fixtures; "web" is left unreachable.
    write(repo.path(), "iptables-save-gw", "*filter\nCOMMIT\n");
    write(
        repo.path(),
        "ip-addr-show-gw",
        "1: lo\n2: eth0: <UP>\n    inet 10.0.0.1/24 scope global eth0\n",
    );

    let backend = Arc::new(MockBackend::new(repo.path().to_path_buf()));
    let orchestrator = Orchestrator::new(
        backend,
        "firelet".to_string(),
        Duration::from_secs(5),
        Duration::from_secs(30),
    );

    let statuses = orchestrator.deploy(&fireset).await.expect("deploy");
    assert_eq!(statuses.get("gw"), Some(&firelet::HostStatus::Ok));
    assert!(matches!(
        statuses.get("web"),
        Some(firelet::HostStatus::Error(_))
    ));
}
