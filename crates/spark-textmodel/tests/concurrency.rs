//! 并发渲染与并发构建
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：模型一经构建即不可变，必须能被多个线程无同步地并发调用；特化编译服务被多个线程
//!   同时用于构建时，单元名称不得重复，关联条目不得串线或残留。
//! - **设计手法 (How)**：使用 `std::thread` 派生多个工作线程，分别共享同一个模型或同一个 `CompilerServices`；
//!   通过 `RUST_LOG` 可打开 `tracing` 输出辅助排查，订阅者的装配方式与 `spark-otel` 一致。
//! - **合同 (What)**：每个线程观察到的输出都与单线程基准一致；全部构建完成后关联表为空，
//!   存活单元数等于仍被持有的模型数。

use std::{
    collections::HashSet,
    sync::{Arc, Barrier},
    thread,
};

use spark_textmodel::{
    CompilerConfig, CompilerServices, SharedTextModel, compiling, compiling_with, interpreting,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const WORKERS: usize = 8;
const ROUNDS: usize = 200;

struct Order {
    id: u64,
    item: String,
}

fn install_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    // 多个测试共享同一进程，重复安装会失败，忽略即可。
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn order_template<B>(factory: &spark_textmodel::TextModelFactory<B>) -> SharedTextModel<Order>
where
    B: spark_textmodel::Backend<Order> + Clone,
{
    let mut builder = factory.new_builder::<Order>();
    builder
        .append("order #")
        .and_then(|b| b.append_fn(|order: &Order| order.id.to_string()))
        .and_then(|b| b.append(": "))
        .and_then(|b| b.append_fn(|order: &Order| order.item.clone()))
        .expect("building");
    builder.build_and_release().expect("assembly succeeds")
}

fn render_from_many_threads(model: SharedTextModel<Order>) {
    let barrier = Arc::new(Barrier::new(WORKERS));
    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let model = Arc::clone(&model);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let order = Order {
                        id: (worker * ROUNDS + round) as u64,
                        item: format!("item-{worker}"),
                    };
                    let expected = format!("order #{}: item-{worker}", order.id);
                    assert_eq!(model.text(&order), expected);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("render worker must not panic");
    }
}

#[test]
fn interpreted_model_renders_concurrently() {
    install_test_logging();
    render_from_many_threads(order_template(&interpreting()));
}

#[test]
fn compiled_model_renders_concurrently() {
    install_test_logging();
    render_from_many_threads(order_template(&compiling()));
}

#[test]
fn concurrent_builds_share_compiler_services() {
    install_test_logging();
    let services = Arc::new(
        CompilerServices::new(CompilerConfig {
            name_page_size: 16,
            registry_purge_threshold: 32,
            ..CompilerConfig::default()
        })
        .expect("config is valid"),
    );
    let barrier = Arc::new(Barrier::new(WORKERS));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let services = Arc::clone(&services);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let factory = compiling_with(services);
                barrier.wait();
                (0..ROUNDS / 4)
                    .map(|round| {
                        let model = order_template(&factory);
                        let order = Order {
                            id: round as u64,
                            item: "pen".to_owned(),
                        };
                        assert_eq!(model.text(&order), format!("order #{round}: pen"));
                        model
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut models = Vec::new();
    for worker in workers {
        models.extend(worker.join().expect("build worker must not panic"));
    }

    assert!(services.correlation().is_empty());
    assert_eq!(services.names().allocated(), (WORKERS * (ROUNDS / 4)) as u64);
    assert_eq!(services.registry().live(), models.len());

    let distinct: HashSet<_> = models
        .iter()
        .map(|model| Arc::as_ptr(model) as *const () as usize)
        .collect();
    assert_eq!(distinct.len(), models.len());

    models.clear();
    assert_eq!(services.registry().live(), 0);
    services.registry().purge();
    assert!(services.registry().is_empty());
}
