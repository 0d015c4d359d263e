pub fn generate_toml_config(network: &str) -> String {
    let conf = format!(
        r#"[account]
uids = "demo-account"

[client]
rpc_url = "http://localhost:8332"
api_key = ""

[network]
descriptor = "{network}"
uids = "bitcoin-{network}"
confirmation_period_seconds = 600

[storage]
working_dir = "tmp"

[metrics]
enabled = true
prometheus_port = 9153

[resources]
ulimit = 2048
cpu_core_available = 6
memory_available = 16
sync_client_threads = 2
sync_client_timeout = 15
"#,
        network = network.to_lowercase(),
    );
    conf
}
