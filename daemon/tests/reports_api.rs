mod support;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use queued_daemon::models::limits::Limits;
use queued_daemon::models::permissions::Permission;
use queued_daemon::models::task::NewTask;
use queued_daemon::repositories;
use queued_daemon::services::core::{Core, UserSubmission};
use queued_daemon::utils::time;

use support::{test_core, ADMIN_NAME, ADMIN_PASSWORD, GIB};

async fn seed_finished_task(
    core: &Arc<Core>,
    user: i64,
    limits: Limits,
    start: DateTime<Utc>,
    seconds: i64,
) -> i64 {
    let id = repositories::tasks::insert(
        core.pool(),
        &NewTask {
            user,
            command: "/bin/true".into(),
            command_arguments: String::new(),
            work_directory: "/tmp".into(),
            nice: 0,
            uid: 1,
            gid: 1,
            limits: limits.encode(),
        },
    )
    .await
    .expect("insert");
    repositories::tasks::set_start_time(core.pool(), id, &time::to_timestamp(start))
        .await
        .expect("start");
    repositories::tasks::set_end_time(
        core.pool(),
        id,
        &time::to_timestamp(start + Duration::seconds(seconds)),
    )
    .await
    .expect("end");
    id
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn performance_multiplies_effective_limits_by_runtime() {
    let core = test_core().await;
    let admin = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("admin");
    let admin_row = repositories::users::by_name(core.pool(), ADMIN_NAME)
        .await
        .expect("select")
        .expect("row");

    // cpu=2 for 60s and an unbounded task (host cpu 4, memory 8 GiB) for 10s.
    seed_finished_task(&core, admin_row.id, Limits::new(2, 0, 1 * GIB, 0, 0), at(1), 60).await;
    seed_finished_task(&core, admin_row.id, Limits::default(), at(2), 10).await;

    let report = core
        .performance_report(Some(at(0)), Some(at(23)), &admin)
        .await
        .expect("report");
    assert_eq!(report.len(), 1);
    let entry = &report[0];
    assert_eq!(entry.id, admin_row.id);
    assert_eq!(entry.user, ADMIN_NAME);
    assert_eq!(entry.count, 2);
    assert_eq!(entry.cpu, 2 * 60 + 4 * 10);
    assert_eq!(entry.memory, 1 * GIB * 60 + 8 * GIB * 10);
}

#[tokio::test]
async fn report_usage_is_additive_over_disjoint_windows() {
    let core = test_core().await;
    let admin = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("admin");
    let admin_row = repositories::users::by_name(core.pool(), ADMIN_NAME)
        .await
        .expect("select")
        .expect("row");

    // Two tasks fully contained in [t0, t1], one in [t1, t2].
    seed_finished_task(&core, admin_row.id, Limits::new(1, 0, 0, 0, 0), at(1), 30).await;
    seed_finished_task(&core, admin_row.id, Limits::new(2, 0, 0, 0, 0), at(2), 30).await;
    seed_finished_task(&core, admin_row.id, Limits::new(3, 0, 0, 0, 0), at(10), 30).await;

    let window = |from: DateTime<Utc>, to: DateTime<Utc>| {
        let core = core.clone();
        let admin = admin.clone();
        async move {
            core.performance_report(Some(from), Some(to), &admin)
                .await
                .expect("report")
                .first()
                .map(|entry| entry.cpu)
                .unwrap_or(0)
        }
    };

    let first = window(at(0), at(9)).await;
    let second = window(at(9), at(23)).await;
    let union = window(at(0), at(23)).await;
    assert_eq!(first + second, union);
    assert_eq!(union, 30 + 2 * 30 + 3 * 30);
}

#[tokio::test]
async fn without_reports_permission_the_output_is_filtered_to_self() {
    let core = test_core().await;
    let admin = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("admin");
    let admin_row = repositories::users::by_name(core.pool(), ADMIN_NAME)
        .await
        .expect("select")
        .expect("row");

    let worker_id = core
        .add_user(
            UserSubmission {
                name: "worker".into(),
                email: String::new(),
                password: "pw".into(),
                permissions: Permission::Job.bit() as i64,
                priority: 0,
                limits: Limits::default(),
            },
            &admin,
        )
        .await
        .expect("add user");
    let worker = core.auth("worker", "pw").await.expect("token");

    seed_finished_task(&core, admin_row.id, Limits::new(1, 0, 0, 0, 0), at(1), 10).await;
    seed_finished_task(&core, worker_id, Limits::new(1, 0, 0, 0, 0), at(2), 10).await;

    let filtered = core
        .performance_report(Some(at(0)), Some(at(23)), &worker)
        .await
        .expect("report");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, worker_id);

    let full = core
        .performance_report(Some(at(0)), Some(at(23)), &admin)
        .await
        .expect("report");
    assert_eq!(full.len(), 2);
}

#[tokio::test]
async fn task_report_defaults_to_the_caller() {
    let core = test_core().await;
    let admin = core.auth(ADMIN_NAME, ADMIN_PASSWORD).await.expect("admin");
    let admin_row = repositories::users::by_name(core.pool(), ADMIN_NAME)
        .await
        .expect("select")
        .expect("row");

    let worker_id = core
        .add_user(
            UserSubmission {
                name: "worker".into(),
                email: String::new(),
                password: "pw".into(),
                permissions: Permission::Job.bit() as i64,
                priority: 0,
                limits: Limits::default(),
            },
            &admin,
        )
        .await
        .expect("add user");
    let worker = core.auth("worker", "pw").await.expect("token");

    seed_finished_task(&core, admin_row.id, Limits::default(), at(1), 10).await;
    seed_finished_task(&core, worker_id, Limits::default(), at(2), 10).await;

    // user = -1 means "self".
    let own = core
        .task_report(Some(-1), None, None, &worker)
        .await
        .expect("report");
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].user, worker_id);

    // Reading another user's tasks requires the Reports permission.
    let err = core
        .task_report(Some(admin_row.id), None, None, &worker)
        .await
        .expect_err("denied");
    assert_eq!(
        err.kind(),
        queued_daemon::error::ErrorKind::InsufficientPermissions
    );
}
