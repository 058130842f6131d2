//! Built-in sweep definitions.

use std::path::Path;

use super::axis::Axis;
use super::scenario::{Sweep, SweepDefinitionError};

/// Link-failure counts swept by the forwarding study.
pub const LINK_FAILURES: [u32; 3] = [30, 50, 100];

/// Forwarding-strategy study over BRITE topologies.
///
/// Axes, in parameter order: topology config, connectivity, forwarding
/// strategy, route, link failures. Names list strategy, route, bandwidth,
/// connectivity and link failure, e.g.
/// `BestRoute_AllRoutes_LowBW_LowConnectivity_LinkFailure_30`.
pub fn forwarding_study(topology_dir: &Path) -> Result<Sweep, SweepDefinitionError> {
    let brite = |file: &str| {
        format!("--briteConfFile={}", topology_dir.join(file).display())
    };

    let topology = Axis::table(
        "BriteConfig",
        [
            brite("brite_low_bw.conf"),
            brite("brite_medium_bw.conf"),
            brite("brite_high_bw.conf"),
        ],
        &[
            ("low_bw", "LowBW"),
            ("medium_bw", "MediumBW"),
            ("high_bw", "HighBW"),
        ],
    );

    let connectivity = Axis::table(
        "Connectivity",
        [
            "--connectivity=low",
            "--connectivity=medium",
            "--connectivity=high",
        ],
        &[
            ("connectivity=low", "LowConnectivity"),
            ("connectivity=medium", "MediumConnectivity"),
            ("connectivity=high", "HighConnectivity"),
        ],
    );

    let strategy = Axis::table(
        "Strategy",
        [
            "--fw-strategy=bestRoute",
            "--fw-strategy=smartflooding",
            "--fw-strategy=perContentBased",
            "--fw-strategy=broadcast",
        ],
        &[
            ("fw-strategy=bestRoute", "BestRoute"),
            ("fw-strategy=smartflooding", "SmartFlooding"),
            ("fw-strategy=perContentBased", "PerContentBased"),
            ("fw-strategy=broadcast", "Broadcast"),
        ],
    );

    let route = Axis::table(
        "Route",
        ["--route=all"],
        &[("route=single", "SingleRoute"), ("route=all", "AllRoutes")],
    );

    let failures = Axis::numeric(
        "LinkFailure",
        LINK_FAILURES.iter().map(|n| format!("--linkFailures={}", n)),
        "LinkFailure",
    );

    Sweep::new()
        .with_axis(topology)?
        .with_axis(connectivity)?
        .with_axis(strategy)?
        .with_axis(route)?
        .with_axis(failures)?
        .with_name_order(vec![2, 3, 0, 1, 4])
}
