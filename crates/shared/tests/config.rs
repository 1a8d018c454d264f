use shared::AgentConfig;

#[test]
fn defaults_round_trip_without_a_config_file() {
    let cfg = AgentConfig::load(None).expect("defaults must always parse");
    assert_eq!(cfg.podcost_lower, 1e-6);
    assert_eq!(cfg.podcost_upper, 1e3);
    assert!(cfg.aggregator_addr.contains("agg-svc"));
    assert!(cfg.dispatcher_addr.contains("pronto-svc"));
}
