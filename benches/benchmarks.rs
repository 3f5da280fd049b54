//! Benchmarks for mfvi operations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mfvi::{GaussianNoise, HalfNet, MfviNn, ModelConfig, NoiseSource, TrainOptions};
use ndarray::{Array2, Array3};

fn random_net(size: &[usize], seed: u64) -> HalfNet {
    let mut net = HalfNet::new(size).unwrap();
    let mut noise = GaussianNoise::with_seed(seed);
    let mean: Vec<f64> = noise.standard_normal(net.no_weights()).iter().map(|x| 0.1 * x).collect();
    let log_variance = vec![-6.0; net.no_weights()];
    net.assign(&mean, &log_variance).unwrap();
    net
}

fn benchmark_forward(c: &mut Criterion) {
    let net = random_net(&[784, 100, 100, 10], 1);
    let k = 10;
    let batch = 100;
    let mut noise = GaussianNoise::with_seed(2);
    let x = Array2::from_shape_vec((batch, 784), noise.standard_normal(batch * 784)).unwrap();
    let inputs = Array3::from_shape_fn((k, batch, 784), |(_, n, d)| x[[n, d]]);

    c.bench_function("halfnet_forward_784_100_100_10_k10", |b| {
        b.iter(|| net.forward(black_box(inputs.view()), k, &mut noise).unwrap())
    });
}

fn benchmark_kl(c: &mut Criterion) {
    let net = random_net(&[784, 100, 100, 10], 3);

    c.bench_function("halfnet_kl_89610", |b| b.iter(|| black_box(&net).kl_term()));
}

fn benchmark_training_epoch(c: &mut Criterion) {
    let config = ModelConfig {
        no_train_samples: 5,
        ..Default::default()
    };
    let mut model = MfviNn::with_config(&[20, 50], &[vec![50, 5]], config).unwrap();
    let mut noise = GaussianNoise::with_seed(4);
    let x = Array2::from_shape_vec((500, 20), noise.standard_normal(500 * 20)).unwrap();
    let y = Array2::from_shape_fn((500, 5), |(i, j)| if i % 5 == j { 1.0 } else { 0.0 });
    let opts = TrainOptions {
        no_epochs: 1,
        batch_size: 100,
        display_epoch: 0,
    };

    let mut session = model.init_session(0, 1e-3).unwrap();
    c.bench_function("train_epoch_500x20", |b| {
        b.iter(|| session.train(black_box(x.view()), black_box(y.view()), &opts).unwrap())
    });
}

criterion_group!(benches, benchmark_forward, benchmark_kl, benchmark_training_epoch);
criterion_main!(benches);
