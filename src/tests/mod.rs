pub mod test_network;

use crate::config::NetworkConfig;
use crate::env::ObservationShape;

/// 6x6 single-plane boards: two 3x3 convolutions leave 2x2, pooling leaves 1x1.
pub(crate) fn small_shape() -> ObservationShape {
    ObservationShape::new(1, 6, 6)
}

pub(crate) fn small_network() -> NetworkConfig {
    NetworkConfig {
        filters: 2,
        kernel_size: 3,
        pool_size: 2,
        hidden_units: 4,
        ..NetworkConfig::default()
    }
}
