//! End-to-end tests for the front lifecycle.
//!
//! Every test drives the scheduler the way the planner does, against the
//! simulated device, and only advances time through `SimDevice::tick`.

use sched_core::backends::sim::{SimBuffer, SimConfig, SimDevice};
use sched_core::{
    FrontOf, FrontState, SchedError, Scheduler, SchedulerSettings, SparseMeta, TransferDevice,
};

type SimFront = FrontOf<SimDevice>;

fn dense(fid: usize, fm: usize, fn_: usize) -> SimFront {
    let data = (0..fm * fn_).map(|i| i as f64).collect();
    SimFront::dense(fid, fm, fn_).with_device_buffer(SimBuffer::new(data))
}

fn sparse(fid: usize, fm: usize, fn_: usize, meta: SparseMeta) -> SimFront {
    let data = (0..fm * fn_).map(|i| (100 + i) as f64).collect();
    SimFront::sparse(fid, fm, fn_, meta).with_device_buffer(SimBuffer::new(data))
}

fn checked() -> SchedulerSettings {
    SchedulerSettings {
        check_invariants: true,
        ..Default::default()
    }
}

#[test]
fn test_dense_and_sparse_lifecycle() {
    let mut fronts = vec![
        dense(0, 3, 3),
        sparse(
            1,
            4,
            3,
            SparseMeta {
                cm: 1,
                ..Default::default()
            },
        ),
    ];
    let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), checked());

    sched.activate_front(0).unwrap();
    sched.activate_front(1).unwrap();
    assert_eq!(sched.front(0).state, FrontState::Factorize);
    assert_eq!(sched.front(1).state, FrontState::AssembleS);
    assert_eq!(sched.active_set().as_slice(), &[0, 1]);

    // Nothing pulled yet.
    assert!(!sched.finish_front(0).unwrap());
    assert!(sched.is_active(0));

    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();

    assert!(!sched.pull_front_data(0).unwrap());
    assert!(!sched.is_data_pulled(0));
    assert!(sched.has_ready_signal(0));

    trigger.fire();
    assert!(sched.pull_front_data(0).unwrap());
    assert!(sched.is_data_pulled(0));
    assert!(!sched.has_ready_signal(0));
    assert!(sched.has_pulled_signal(0));

    // Pull issued but the copy is still on the transfer channel.
    assert!(!sched.finish_front(0).unwrap());
    sched.device_mut().advance(2);
    assert!(sched.finish_front(0).unwrap());

    assert!(!sched.is_active(0));
    assert_eq!(sched.active_set().as_slice(), &[1]);
    assert_eq!(sched.active_set().position(1), Some(0));
    assert!(!sched.has_pulled_signal(0));

    let host = sched.front(0).cpu_r.as_ref().unwrap();
    assert_eq!(host, &(0..9).map(|i| i as f64).collect::<Vec<_>>());

    let stats = sched.stats();
    assert_eq!(stats.activations, 2);
    assert_eq!(stats.pulls_issued, 1);
    assert_eq!(stats.values_pulled, 9);
    assert_eq!(stats.finishes, 1);
    assert_eq!(stats.pull_not_ready, 1);
    assert_eq!(stats.finish_not_ready, 2);
    assert_eq!(stats.max_active, 2);
}

#[test]
fn test_push_only_front_needs_no_transfer() {
    let mut fronts = vec![sparse(
        0,
        4,
        4,
        SparseMeta {
            cm: 2,
            push_only: true,
            is_staged: false,
        },
    )];
    let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), checked());

    sched.activate_front(0).unwrap();
    assert_eq!(sched.front(0).state, FrontState::ParentWait);

    assert!(sched.pull_front_data(0).unwrap());
    assert!(!sched.has_pulled_signal(0));
    assert_eq!(sched.device().live_signals(), 0);
    assert_eq!(sched.device().stats().copies_issued, 0);

    assert!(sched.finish_front(0).unwrap());
    assert_eq!(sched.num_active_fronts(), 0);
    assert!(sched.front(0).cpu_r.is_none());
}

#[test]
fn test_push_only_finish_releases_unused_ready_signal() {
    let mut fronts = vec![sparse(
        0,
        2,
        2,
        SparseMeta {
            push_only: true,
            ..Default::default()
        },
    )];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    let ready = sched.device_mut().launch_kernel(1);
    sched.attach_ready_signal(0, ready).unwrap();
    assert_eq!(sched.device().live_signals(), 1);

    assert!(sched.finish_front(0).unwrap());
    assert!(!sched.has_ready_signal(0));
    assert_eq!(sched.device().live_signals(), 0);
}

#[test]
fn test_entry_points_are_idempotent() {
    let mut fronts = vec![dense(0, 2, 2), dense(1, 2, 2)];
    let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), checked());

    sched.activate_front(0).unwrap();
    sched.activate_front(1).unwrap();
    sched.activate_front(0).unwrap();
    assert_eq!(sched.active_set().as_slice(), &[0, 1]);
    assert_eq!(sched.stats().activations, 2);
    assert_eq!(sched.front(0).state, FrontState::Factorize);

    // Re-activation leaves a later state alone.
    sched.set_state(1, FrontState::FactorizeComplete).unwrap();
    sched.activate_front(1).unwrap();
    assert_eq!(sched.front(1).state, FrontState::FactorizeComplete);

    let ready = sched.device_mut().launch_kernel(0);
    sched.attach_ready_signal(0, ready).unwrap();
    sched.device_mut().tick();

    assert!(sched.pull_front_data(0).unwrap());
    assert!(sched.pull_front_data(0).unwrap());
    assert_eq!(sched.stats().pulls_issued, 1);
    assert_eq!(sched.device().stats().copies_issued, 1);

    sched.device_mut().run_until_idle();
    assert!(sched.finish_front(0).unwrap());
    assert!(sched.finish_front(0).unwrap());
    assert_eq!(sched.stats().finishes, 1);
    assert_eq!(sched.active_set().as_slice(), &[1]);

    // Finishing a front that was never active is a no-op.
    let mut more = vec![dense(0, 1, 1)];
    let mut idle = Scheduler::with_defaults(&mut more, SimDevice::with_defaults());
    assert!(idle.finish_front(0).unwrap());
    assert_eq!(idle.stats().finishes, 0);
}

#[test]
fn test_pull_not_ready_has_no_side_effects() {
    let mut fronts = vec![dense(0, 2, 3)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    let ready = sched.device_mut().launch_kernel(5);
    sched.attach_ready_signal(0, ready).unwrap();

    for _ in 0..3 {
        assert!(!sched.pull_front_data(0).unwrap());
    }
    assert!(sched.has_ready_signal(0));
    assert!(!sched.has_pulled_signal(0));
    assert!(sched.front(0).cpu_r.is_none());
    assert_eq!(sched.device().stats().copies_issued, 0);
    assert_eq!(sched.stats().pull_not_ready, 3);
}

#[test]
fn test_finished_front_is_not_reactivated() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    let ready = sched.device_mut().launch_kernel(1);
    sched.attach_ready_signal(0, ready).unwrap();
    while !sched.pull_front_data(0).unwrap() {
        sched.device_mut().tick();
    }
    while !sched.finish_front(0).unwrap() {
        sched.device_mut().tick();
    }

    sched.activate_front(0).unwrap();
    assert!(!sched.is_active(0));
    assert_eq!(sched.num_active_fronts(), 0);
    assert_eq!(sched.stats().activations, 1);
}

#[test]
fn test_pull_without_ready_signal_is_an_error() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
    sched.activate_front(0).unwrap();

    let err = sched.pull_front_data(0).unwrap_err();
    assert!(matches!(err, SchedError::MissingReadySignal(0)));
}

#[test]
fn test_pull_without_device_buffer_is_an_error() {
    let mut fronts = vec![SimFront::dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
    sched.activate_front(0).unwrap();

    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();
    trigger.fire();

    let err = sched.pull_front_data(0).unwrap_err();
    assert!(matches!(err, SchedError::MissingDeviceBuffer(0)));
    assert!(!sched.is_data_pulled(0));
}

#[test]
fn test_second_ready_signal_is_rejected() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
    sched.activate_front(0).unwrap();

    let first = sched.device_mut().launch_kernel(1);
    let second = sched.device_mut().launch_kernel(1);
    sched.attach_ready_signal(0, first).unwrap();
    let err = sched.attach_ready_signal(0, second).unwrap_err();
    assert!(matches!(err, SchedError::ReadySignalAlreadyAttached(0)));

    // The rejected signal was dropped.
    assert_eq!(sched.device().live_signals(), 1);
}

#[test]
fn test_ready_signal_after_pull_is_rejected() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
    sched.activate_front(0).unwrap();

    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();
    trigger.fire();
    assert!(sched.pull_front_data(0).unwrap());

    let late = sched.device_mut().launch_kernel(1);
    let err = sched.attach_ready_signal(0, late).unwrap_err();
    assert!(matches!(err, SchedError::ReadySignalAfterPull(0)));
    assert!(!sched.has_ready_signal(0));
    // Only the pulled signal is left.
    assert_eq!(sched.device().live_signals(), 1);

    sched.device_mut().run_until_idle();
    assert!(sched.finish_front(0).unwrap());

    let late = sched.device_mut().launch_kernel(1);
    let err = sched.attach_ready_signal(0, late).unwrap_err();
    assert!(matches!(err, SchedError::ReadySignalAfterPull(0)));
    assert!(!sched.has_ready_signal(0));

    let (device, report) = sched.teardown().unwrap();
    assert!(report.is_clean());
    assert_eq!(device.live_signals(), 0);
}

#[test]
fn test_ready_signal_for_finished_push_only_front_is_rejected() {
    let mut fronts = vec![sparse(
        0,
        2,
        2,
        SparseMeta {
            push_only: true,
            ..Default::default()
        },
    )];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());
    sched.activate_front(0).unwrap();
    assert!(sched.finish_front(0).unwrap());

    let late = sched.device_mut().launch_kernel(1);
    let err = sched.attach_ready_signal(0, late).unwrap_err();
    assert!(matches!(err, SchedError::ReadySignalAfterPull(0)));
    assert_eq!(sched.device().live_signals(), 0);
}

#[test]
fn test_queries_on_unknown_front_return_false() {
    let mut fronts = vec![dense(0, 2, 2)];
    let sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    assert!(!sched.is_active(5));
    assert!(!sched.is_data_pulled(5));
    assert!(!sched.has_ready_signal(5));
    assert!(!sched.has_pulled_signal(5));
}

#[test]
fn test_unknown_front_is_an_error() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    let err = sched.activate_front(3).unwrap_err();
    assert!(matches!(err, SchedError::UnknownFront { front: 3, len: 1 }));
    assert!(sched.pull_front_data(1).is_err());
    assert!(sched.finish_front(1).is_err());
    assert!(!sched.is_active(7));
}

#[test]
fn test_state_writes_follow_transition_table() {
    let mut fronts = vec![dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    let err = sched.set_state(0, FrontState::Factorize).unwrap_err();
    assert!(matches!(err, SchedError::NotActive(0)));

    sched.activate_front(0).unwrap();
    sched.set_state(0, FrontState::FactorizeComplete).unwrap();
    assert_eq!(sched.front(0).state, FrontState::FactorizeComplete);

    let err = sched.set_state(0, FrontState::AssembleS).unwrap_err();
    assert!(matches!(
        err,
        SchedError::IllegalTransition {
            front: 0,
            from: FrontState::FactorizeComplete,
            to: FrontState::AssembleS,
        }
    ));

    sched.set_state(0, FrontState::Done).unwrap();
    assert!(sched.front(0).state.is_terminal());
}

#[test]
fn test_staged_front_pulls_contribution_block() {
    let meta = SparseMeta {
        cm: 2,
        push_only: false,
        is_staged: true,
    };
    let mut fronts = vec![sparse(0, 6, 4, meta)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();
    trigger.fire();
    assert!(sched.pull_front_data(0).unwrap());

    // R is 4x4, the contribution block adds 2 rows of 4.
    assert_eq!(sched.stats().values_pulled, 24);
    let host = sched.front(0).cpu_r.as_ref().unwrap();
    assert_eq!(host.len(), 24);
    assert_eq!(host[0], 100.0);
    assert_eq!(host[23], 123.0);
}

#[test]
fn test_host_mirror_reuse() {
    let run = |reuse: bool| {
        let mut fronts = vec![dense(0, 2, 2)];
        fronts[0].cpu_r = Some(vec![-1.0; 8]);
        let settings = SchedulerSettings {
            reuse_host_buffers: reuse,
            ..Default::default()
        };
        let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), settings);
        sched.activate_front(0).unwrap();
        let (ready, trigger) = sched.device_mut().manual_signal();
        sched.attach_ready_signal(0, ready).unwrap();
        trigger.fire();
        assert!(sched.pull_front_data(0).unwrap());
        sched.front(0).cpu_r.clone().unwrap()
    };

    let reused = run(true);
    assert_eq!(reused.len(), 8);
    assert_eq!(&reused[..4], &[0.0, 1.0, 2.0, 3.0]);
    assert_eq!(reused[4], -1.0);

    let fresh = run(false);
    assert_eq!(fresh, vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_failed_copy_keeps_host_mirror() {
    let mut fronts = vec![SimFront::dense(0, 3, 3).with_device_buffer(SimBuffer::zeros(4))];
    fronts[0].cpu_r = Some(vec![7.0; 16]);
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();
    trigger.fire();

    let err = sched.pull_front_data(0).unwrap_err();
    assert!(matches!(err, SchedError::Device { .. }));
    assert!(!sched.is_data_pulled(0));
    assert_eq!(sched.front(0).cpu_r.as_ref().map(Vec::len), Some(16));
}

#[test]
fn test_transfers_complete_in_issue_order() {
    let config = SimConfig {
        transfer_latency: 1,
        values_per_tick: 4,
    };
    let mut fronts = vec![dense(0, 4, 4), dense(1, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::new(config));

    for f in 0..2 {
        sched.activate_front(f).unwrap();
        let (ready, trigger) = sched.device_mut().manual_signal();
        sched.attach_ready_signal(f, ready).unwrap();
        trigger.fire();
        assert!(sched.pull_front_data(f).unwrap());
    }

    // Front 0 takes 1 + 16/4 = 5 ticks; front 1 queues behind it.
    sched.device_mut().advance(5);
    assert!(!sched.finish_front(1).unwrap());
    assert!(sched.finish_front(0).unwrap());
    sched.device_mut().advance(2);
    assert!(sched.finish_front(1).unwrap());
}

#[test]
fn test_teardown_reports_and_releases_signals() {
    let mut fronts = vec![dense(0, 2, 2), dense(1, 2, 2), dense(2, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    for f in 0..3 {
        sched.activate_front(f).unwrap();
    }
    let ready = sched.device_mut().launch_kernel(10);
    sched.attach_ready_signal(0, ready).unwrap();

    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(1, ready).unwrap();
    trigger.fire();
    assert!(sched.pull_front_data(1).unwrap());
    assert_eq!(sched.device().live_signals(), 2);

    let (device, report) = sched.teardown().unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.still_active, 3);
    assert_eq!(report.outstanding_ready, 1);
    assert_eq!(report.outstanding_pulled, 1);
    assert_eq!(device.live_signals(), 0);
}

#[test]
fn test_planner_loop_drains_all_fronts() {
    let mut fronts: Vec<SimFront> = (0..12).map(|f| dense(f, 2 + f % 3, 3)).collect();
    let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), checked());

    for f in 0..12 {
        sched.activate_front(f).unwrap();
        let ready = sched.device_mut().launch_kernel(1 + (f as u64 * 7) % 5);
        sched.attach_ready_signal(f, ready).unwrap();
    }

    let mut ticks = 0;
    while sched.num_active_fronts() > 0 {
        let active: Vec<usize> = sched.active_set().iter().collect();
        for f in active {
            if sched.pull_front_data(f).unwrap() {
                sched.finish_front(f).unwrap();
            }
        }
        sched.device_mut().tick();
        ticks += 1;
        assert!(ticks < 100, "planner loop did not drain");
    }

    assert_eq!(sched.stats().finishes, 12);
    assert_eq!(sched.stats().max_active, 12);
    let (device, report) = sched.teardown().unwrap();
    assert!(report.is_clean());
    assert_eq!(device.live_signals(), 0);
}

#[test]
fn test_fronts_mut_hands_out_buffers() {
    let mut fronts = vec![SimFront::dense(0, 2, 2)];
    let mut sched = Scheduler::with_defaults(&mut fronts, SimDevice::with_defaults());

    sched.activate_front(0).unwrap();
    sched.fronts_mut()[0].gpu_f = Some(SimBuffer::new(vec![1.0, 2.0, 3.0, 4.0]));
    let buf = sched.device_mut().alloc_host(4).unwrap();
    assert_eq!(sched.device().host_len(&buf), 4);

    let (ready, trigger) = sched.device_mut().manual_signal();
    sched.attach_ready_signal(0, ready).unwrap();
    trigger.fire();
    assert!(sched.pull_front_data(0).unwrap());
    assert_eq!(sched.fronts()[0].cpu_r, Some(vec![1.0, 2.0, 3.0, 4.0]));
}

mod props {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone)]
    enum Op {
        Activate(usize),
        Pull(usize),
        Finish(usize),
        Tick,
    }

    const N: usize = 6;

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..N).prop_map(Op::Activate),
            (0..N).prop_map(Op::Pull),
            (0..N).prop_map(Op::Finish),
            Just(Op::Tick),
        ]
    }

    fn front(f: usize) -> SimFront {
        match f % 3 {
            0 => dense(f, 3, 2),
            1 => sparse(
                f,
                4,
                2,
                SparseMeta {
                    cm: 2,
                    push_only: false,
                    is_staged: true,
                },
            ),
            _ => sparse(
                f,
                2,
                2,
                SparseMeta {
                    push_only: true,
                    ..Default::default()
                },
            ),
        }
    }

    proptest! {
        #[test]
        fn prop_lifecycle_preserves_invariants(ops in prop::collection::vec(op(), 1..80)) {
            let mut fronts: Vec<SimFront> = (0..N).map(front).collect();
            let mut sched = Scheduler::new(&mut fronts, SimDevice::with_defaults(), checked());

            let mut active = BTreeSet::new();
            let mut finished = BTreeSet::new();
            let mut pulled = BTreeSet::new();

            for op in ops {
                match op {
                    Op::Activate(f) => {
                        let fresh = !active.contains(&f) && !finished.contains(&f);
                        let before = sched.front(f).state;
                        sched.activate_front(f).unwrap();
                        if !fresh {
                            prop_assert_eq!(sched.front(f).state, before);
                        }
                        if fresh {
                            active.insert(f);
                            let ready = sched.device_mut().launch_kernel(1 + f as u64);
                            sched.attach_ready_signal(f, ready).unwrap();
                        }
                    }
                    Op::Pull(f) => {
                        if sched.has_ready_signal(f) || sched.is_data_pulled(f) {
                            if sched.pull_front_data(f).unwrap() {
                                pulled.insert(f);
                            }
                        }
                    }
                    Op::Finish(f) => {
                        let was_active = sched.is_active(f);
                        let done = sched.finish_front(f).unwrap();
                        if was_active && done {
                            // Only push-only fronts finish without a pull.
                            prop_assert!(pulled.contains(&f) || f % 3 == 2);
                            active.remove(&f);
                            finished.insert(f);
                        }
                        prop_assert_eq!(done, !sched.is_active(f));
                    }
                    Op::Tick => sched.device_mut().tick(),
                }

                prop_assert!(sched.active_set().check_invariants().is_ok());
                let got: BTreeSet<usize> = sched.active_set().iter().collect();
                prop_assert_eq!(&got, &active);
                for f in &finished {
                    prop_assert!(!sched.is_active(*f));
                    prop_assert!(!sched.has_pulled_signal(*f));
                }
            }

            let (device, report) = sched.teardown().unwrap();
            prop_assert_eq!(report.still_active, active.len());
            prop_assert_eq!(device.live_signals(), 0);
        }
    }
}
