use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use env_logger::{Builder, Env};
use gpcov::{dense_precision, KernelSpec, PrecisionCache, DEGENERACY_TOL};
use ndarray::{s, Array1};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_woodbury(c: &mut Criterion) {
    let env = Env::new().filter_or("GPCOV_LOG", "error");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let kernel = KernelSpec::squared_exponential(0., 0., -2.);
    let block = 5;

    let mut group = c.benchmark_group("woodbury");
    group.sample_size(20);
    for n in [50, 100, 200] {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let times = Array1::random_using(n + block, Uniform::new(0., 20.), &mut rng);
        let cov = gpcov::covariance_matrix(&kernel, &times);
        let cache: PrecisionCache<f64> =
            dense_precision(&cov.slice(s![..n, ..n]), DEGENERACY_TOL).expect("prior precision");

        group.bench_with_input(BenchmarkId::new("append", n), &n, |b, _| {
            b.iter(|| std::hint::black_box(cache.append_block(&cov).expect("append")))
        });
        group.bench_with_input(BenchmarkId::new("full inversion", n), &n, |b, _| {
            b.iter(|| std::hint::black_box(dense_precision(&cov, DEGENERACY_TOL).expect("dense")))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_woodbury);
criterion_main!(benches);
