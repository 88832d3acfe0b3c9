use ndarray::{array, Array3, Array4, ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{small_network, small_shape};
use crate::config::NetworkConfig;
use crate::env::ObservationShape;
use crate::error::DqnError;
use crate::layers::WeightInit;
use crate::network::{argmax, ConvQNetwork, QNetwork};
use crate::optimizer::OptimizerConfig;

fn network(seed: u64) -> ConvQNetwork {
    ConvQNetwork::new(small_shape(), 3, &small_network(), &mut StdRng::seed_from_u64(seed)).unwrap()
}

fn board(seed: u64) -> Array3<f32> {
    Array3::from_shape_fn((1, 6, 6), |(_, h, w)| ((h * 7 + w * 3 + seed as usize) % 5) as f32 / 4.0)
}

#[test]
fn test_output_shapes() {
    let mut net = network(1);
    assert_eq!(net.num_actions(), 3);
    assert_eq!(net.predict(board(0).view()).unwrap().len(), 3);

    let batch = Array4::from_shape_fn((4, 1, 6, 6), |(b, _, h, w)| (b + h + w) as f32 * 0.1);
    assert_eq!(net.predict_batch(batch.view()).unwrap().dim(), (4, 3));
}

#[test]
fn test_batch_rows_match_single_predictions() {
    let mut net = network(2);
    let states = [board(0), board(1)];
    let views: Vec<_> = states.iter().map(|s| s.view()).collect();
    let batch = ndarray::stack(ndarray::Axis(0), &views).unwrap();
    let values = net.predict_batch(batch.view()).unwrap();
    for (i, state) in states.iter().enumerate() {
        let single = net.predict(state.view()).unwrap();
        for (a, b) in single.iter().zip(values.row(i).iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}

#[test]
fn test_default_architecture_parameter_count() {
    let shape = ObservationShape::new(1, 20, 20);
    let net = ConvQNetwork::new(shape, 5, &NetworkConfig::default(), &mut StdRng::seed_from_u64(0)).unwrap();
    // conv1 24*1*49+24, conv2 24*24*49+24, pooled 24*4*4 -> 24 hidden, 24 -> 5 actions
    let expected = (24 * 49 + 24) + (24 * 24 * 49 + 24) + (384 * 24 + 24) + (24 * 5 + 5);
    assert_eq!(net.parameter_count(), expected);
}

#[test]
fn test_default_weights_are_glorot_uniform() {
    let net = network(9);
    for tensor in net.get_weights() {
        let (fan_in, fan_out) = match tensor.shape() {
            &[out, inp, kh, kw] => (inp * kh * kw, out * kh * kw),
            &[inp, out] => (inp, out),
            // biases start at zero
            _ => {
                assert!(tensor.iter().all(|v| *v == 0.0));
                continue;
            }
        };
        let limit = (6.0f32 / (fan_in + fan_out) as f32).sqrt();
        assert!(tensor.iter().all(|v| v.abs() <= limit), "{:?} exceeds {}", tensor.shape(), limit);
    }
}

#[test]
fn test_configured_initializer_reaches_every_layer() {
    let config = NetworkConfig { weight_init: WeightInit::Zeros, ..small_network() };
    let net = ConvQNetwork::new(small_shape(), 3, &config, &mut StdRng::seed_from_u64(0)).unwrap();
    assert!(net.get_weights().iter().all(|t| t.iter().all(|v| *v == 0.0)));
}

#[test]
fn test_too_small_observation_is_rejected() {
    let shape = ObservationShape::new(1, 4, 4);
    let result = ConvQNetwork::new(shape, 3, &small_network(), &mut StdRng::seed_from_u64(0));
    assert!(matches!(result, Err(DqnError::InvalidParameter { .. })));
}

#[test]
fn test_wrong_input_shape_is_rejected() {
    let mut net = network(3);
    let state = Array3::<f32>::zeros((2, 6, 6));
    assert!(matches!(net.predict(state.view()), Err(DqnError::DimensionMismatch { .. })));
    assert!(matches!(
        net.fit(state.view(), array![0.0, 0.0, 0.0].view()),
        Err(DqnError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_fit_reduces_loss_on_fixed_sample() {
    let mut net = network(4);
    let state = board(2);
    let target = array![1.0, -1.0, 0.5];

    let first = net.fit(state.view(), target.view()).unwrap();
    let mut last = first;
    for _ in 0..300 {
        last = net.fit(state.view(), target.view()).unwrap();
    }
    assert!(last < first, "loss went from {} to {}", first, last);
}

#[test]
fn test_sgd_network_also_learns() {
    let mut config = small_network();
    config.optimizer = OptimizerConfig::Sgd;
    config.learning_rate = 0.01;
    let mut net = ConvQNetwork::new(small_shape(), 3, &config, &mut StdRng::seed_from_u64(5)).unwrap();
    let state = board(1);
    let target = array![0.5, 0.5, 0.5];

    let first = net.fit(state.view(), target.view()).unwrap();
    let mut last = first;
    for _ in 0..300 {
        last = net.fit(state.view(), target.view()).unwrap();
    }
    assert!(last < first);
}

#[test]
fn test_get_and_set_weights() {
    let source = network(6);
    let mut copy = network(7);
    assert_ne!(source.get_weights(), copy.get_weights());

    copy.set_weights(source.get_weights()).unwrap();
    assert_eq!(source.get_weights(), copy.get_weights());

    let mut weights = source.get_weights();
    weights[4] = ArrayD::zeros(IxDyn(&[3, 3]));
    assert!(matches!(copy.set_weights(weights), Err(DqnError::DimensionMismatch { .. })));

    let mut weights = source.get_weights();
    weights.pop();
    assert!(matches!(copy.set_weights(weights), Err(DqnError::DimensionMismatch { .. })));
}

#[test]
fn test_save_load_reproduces_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    let mut saved = network(8);
    saved.save_weights(&path).unwrap();

    let mut restored = network(9);
    restored.load_weights(&path).unwrap();

    let state = board(3);
    assert_eq!(saved.predict(state.view()).unwrap(), restored.predict(state.view()).unwrap());
}

#[test]
fn test_load_rejects_other_architecture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    network(10).save_weights(&path).unwrap();

    let mut other = ConvQNetwork::new(small_shape(), 4, &small_network(), &mut StdRng::seed_from_u64(0)).unwrap();
    assert!(matches!(other.load_weights(&path), Err(DqnError::ArtifactLoad { .. })));

    let mut wider = small_network();
    wider.hidden_units = 8;
    let mut other = ConvQNetwork::new(small_shape(), 3, &wider, &mut StdRng::seed_from_u64(0)).unwrap();
    assert!(matches!(other.load_weights(&path), Err(DqnError::ArtifactLoad { .. })));
}

#[test]
fn test_argmax() {
    assert_eq!(argmax(array![0.1, 0.7, 0.3].view()), Some(1));
    assert_eq!(argmax(array![0.5, 0.5, 0.2].view()), Some(0));
    assert_eq!(argmax(array![f32::NAN, -1.0, -2.0].view()), Some(1));
    assert_eq!(argmax(array![f32::NAN].view()), None);
    assert_eq!(argmax(ndarray::Array1::<f32>::zeros(0).view()), None);
}
