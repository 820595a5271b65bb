//! Stress tests for reference counting and teardown under contention.
//!
//! Run with: `cargo test --test stress_test -- --nocapture`

mod common;

use common::{class_with, tracked_object};
use finch::{Class, Imp, Object, Str};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const THREADS: usize = 8;
const ROUNDS: usize = 10_000;

#[test]
fn test_concurrent_inc_dec_keeps_count() {
    let drops = Arc::new(AtomicUsize::new(0));
    let obj = tracked_object("StressCount", &drops);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let obj = obj.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let extra = obj.inc_ref();
                    extra.dec_ref();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(obj.refcount(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(obj);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_racing_final_release_destroys_once() {
    for _ in 0..100 {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked_object("StressRace", &drops);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let handle = obj.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    handle.dec_ref();
                })
            })
            .collect();
        drop(obj);

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}

static CHAIN_LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn base_destroy(obj: &Object, class: Class) {
    CHAIN_LOG.lock().unwrap().push("base");
    obj.super_destroy(class);
}

fn middle_destroy(obj: &Object, class: Class) {
    CHAIN_LOG.lock().unwrap().push("middle");
    obj.super_destroy(class);
}

fn leaf_destroy(obj: &Object, class: Class) {
    CHAIN_LOG.lock().unwrap().push("leaf");
    obj.super_destroy(class);
}

#[test]
fn test_destroy_chain_under_contention() {
    let base = class_with("StressBase", &Class::root(), &[Imp::Destroy(base_destroy)]);
    let middle = class_with("StressMiddle", &base, &[Imp::Destroy(middle_destroy)]);
    let leaf = class_with("StressLeaf", &middle, &[Imp::Destroy(leaf_destroy)]);

    let obj = leaf.make_obj();
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let handle = obj.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..1_000 {
                    drop(handle.clone());
                }
                handle.dec_ref();
            })
        })
        .collect();
    drop(obj);

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*CHAIN_LOG.lock().unwrap(), vec!["leaf", "middle", "base"]);
}

#[test]
fn test_shared_strings_across_threads() {
    let shared = Str::new("shared across threads");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let local = shared.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let copy = local.clone_obj().unwrap();
                    assert!(copy.equals(&local));
                }
                local.hash_sum()
            })
        })
        .collect();

    let hashes: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(hashes.iter().all(|h| *h == shared.hash_sum()));
    assert_eq!(shared.refcount(), 1);
}

#[test]
fn test_object_graph_released() {
    let drops = Arc::new(AtomicUsize::new(0));

    {
        let leaves: Vec<Object> = (0..100)
            .map(|_| tracked_object("StressGraphLeaf", &drops))
            .collect();
        let holder = Class::singleton("StressGraphHolder", &Class::root()).make_obj_with(leaves);
        let _aliases: Vec<Object> = (0..10).map(|_| holder.clone()).collect();
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    assert_eq!(drops.load(Ordering::SeqCst), 100);
}
