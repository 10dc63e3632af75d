use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use vhid::config::VhidConfig;
use vhid::hid::{
    report_byte_length, DeviceContext, DeviceMode, HidError, InputReport, ReadStatus, RequestId,
    TouchContact,
};

const READS: usize = 2000;
const REPORTS: usize = 3000;

fn multi_touch_device() -> Arc<DeviceContext> {
    let mut config = VhidConfig::default();
    config.device.initial_mode = DeviceMode::MultiTouch;
    Arc::new(DeviceContext::from_config(&config).unwrap())
}

fn report(seq: usize) -> InputReport {
    InputReport::MultiTouch {
        contacts: vec![TouchContact {
            id: (seq % 5) as u8,
            present: seq % 2 == 0,
            x: (seq % 32768) as u16,
            y: ((seq * 7) % 32768) as u16,
        }],
    }
}

/// Every pending read completes exactly once no matter how producers,
/// consumers and cancelers interleave.
#[test]
fn pending_reads_complete_exactly_once() {
    let device = multi_touch_device();
    let completions: Arc<Vec<AtomicU32>> =
        Arc::new((0..READS).map(|_| AtomicU32::new(0)).collect());
    let pending: Arc<Mutex<Vec<(usize, RequestId)>>> = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let device = device.clone();
        thread::spawn(move || {
            for seq in 0..REPORTS {
                device.submit_report(&report(seq)).unwrap();
                if seq % 64 == 0 {
                    thread::yield_now();
                }
            }
        })
    };

    let consumer = {
        let device = device.clone();
        let completions = completions.clone();
        let pending = pending.clone();
        thread::spawn(move || {
            let mut immediate = Vec::new();
            for token in 0..READS {
                let completions = completions.clone();
                let status = device
                    .read_input_report(
                        64,
                        Box::new(move |_| {
                            completions[token].fetch_add(1, Ordering::SeqCst);
                        }),
                    )
                    .unwrap();
                match status {
                    ReadStatus::Ready(_) => immediate.push(token),
                    ReadStatus::Pending(id) => pending.lock().unwrap().push((token, id)),
                }
            }
            immediate
        })
    };

    let canceler = {
        let device = device.clone();
        let pending = pending.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut canceled = 0usize;
            while !done.load(Ordering::SeqCst) {
                let target = pending.lock().unwrap().last().map(|&(_, id)| id);
                if let Some(id) = target {
                    if device.cancel_read(id) {
                        canceled += 1;
                    }
                }
                thread::yield_now();
            }
            canceled
        })
    };

    producer.join().unwrap();
    let immediate = consumer.join().unwrap();
    done.store(true, Ordering::SeqCst);
    let canceled = canceler.join().unwrap();

    // Resolve whatever is still parked
    device.set_mode(DeviceMode::MultiTouch);
    assert_eq!(device.pending_reads(), 0);

    for token in &immediate {
        assert_eq!(completions[*token].load(Ordering::SeqCst), 0);
    }
    let pending = pending.lock().unwrap();
    for (token, id) in pending.iter() {
        assert_eq!(
            completions[*token].load(Ordering::SeqCst),
            1,
            "read {} completed the wrong number of times",
            id
        );
    }
    assert_eq!(immediate.len() + pending.len(), READS);

    let stats = device.stats();
    assert_eq!(stats.accepted, REPORTS as u64);
    assert_eq!(stats.canceled, canceled as u64);
    assert_eq!(stats.rejected, 0);
}

/// A mode switch racing with submissions never lets an old-mode report
/// reach a reader after the switch.
#[test]
fn mode_switch_isolates_epochs() {
    let device = multi_touch_device();

    let producer = {
        let device = device.clone();
        thread::spawn(move || {
            let mut rejected = 0usize;
            for seq in 0..REPORTS {
                match device.submit_report(&report(seq)) {
                    Ok(_) => {}
                    Err(HidError::Validation(_)) => rejected += 1,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            rejected
        })
    };

    thread::sleep(Duration::from_millis(1));
    device.set_mode(DeviceMode::SingleTouch);
    let rejected = producer.join().unwrap();

    // Nothing buffered before the switch survives, and nothing submitted
    // after it is accepted in the wrong mode
    let mut drained = 0;
    loop {
        match device
            .read_input_report(64, Box::new(|_| {}))
            .unwrap()
        {
            ReadStatus::Ready(_) => drained += 1,
            ReadStatus::Pending(id) => {
                assert!(device.cancel_read(id));
                break;
            }
        }
    }
    assert_eq!(drained, 0);
    assert_eq!(device.stats().rejected, rejected as u64);
}

/// Reads re-armed while the mode flips only ever receive reports laid out
/// for the mode that was active when they were delivered.
#[test]
fn rearmed_reads_never_see_old_mode_reports() {
    let device = multi_touch_device();
    let switched = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let old_producer = {
        let device = device.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut seq = 0;
            while !stop.load(Ordering::SeqCst) {
                match device.submit_report(&report(seq)) {
                    Ok(_) | Err(HidError::Validation(_)) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
                seq += 1;
            }
        })
    };

    let new_producer = {
        let device = device.clone();
        let switched = switched.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut seq = 0u16;
            while !stop.load(Ordering::SeqCst) {
                if !switched.load(Ordering::SeqCst) {
                    thread::yield_now();
                    continue;
                }
                let touch = InputReport::SingleTouch {
                    present: true,
                    x: seq % 1000,
                    y: seq % 1000,
                };
                device.submit_report(&touch).unwrap();
                seq = seq.wrapping_add(1);
            }
        })
    };

    let consumer = {
        let device = device.clone();
        let switched = switched.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut delivered_after_switch = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let issued_after_switch = switched.load(Ordering::SeqCst);
                let (tx, rx) = mpsc::channel();
                let status = device
                    .read_input_report(
                        64,
                        Box::new(move |result| {
                            let _ = tx.send(result);
                        }),
                    )
                    .unwrap();
                let result = match status {
                    ReadStatus::Ready(bytes) => Ok(bytes),
                    ReadStatus::Pending(id) => match rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(result) => result,
                        Err(_) => {
                            device.cancel_read(id);
                            rx.recv().unwrap()
                        }
                    },
                };

                if issued_after_switch {
                    match result {
                        Ok(bytes) => {
                            assert_eq!(
                                bytes.len(),
                                report_byte_length(DeviceMode::SingleTouch),
                                "old-mode report delivered after the switch"
                            );
                            delivered_after_switch += 1;
                        }
                        Err(e) => assert_eq!(e, HidError::Canceled),
                    }
                } else if let Ok(bytes) = result {
                    let len = bytes.len();
                    assert!(
                        len == report_byte_length(DeviceMode::MultiTouch)
                            || len == report_byte_length(DeviceMode::SingleTouch)
                    );
                }
            }
            delivered_after_switch
        })
    };

    thread::sleep(Duration::from_millis(10));
    device.set_mode(DeviceMode::SingleTouch);
    switched.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    stop.store(true, Ordering::SeqCst);

    old_producer.join().unwrap();
    new_producer.join().unwrap();
    let delivered_after_switch = consumer.join().unwrap();
    assert!(delivered_after_switch > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_reader_receives_reports_from_thread() {
    let device = multi_touch_device();

    let reader = {
        let device = device.clone();
        tokio::spawn(async move {
            let mut got = Vec::new();
            for _ in 0..4 {
                got.push(device.read_report(64).await.unwrap());
            }
            got
        })
    };

    let producer = {
        let device = device.clone();
        thread::spawn(move || {
            for seq in 0..4 {
                while device.pending_reads() == 0 {
                    thread::yield_now();
                }
                device.submit_report(&report(seq)).unwrap();
            }
        })
    };

    let got = reader.await.unwrap();
    producer.join().unwrap();
    for (seq, bytes) in got.iter().enumerate() {
        assert_eq!(
            InputReport::from_bytes(DeviceMode::MultiTouch, bytes).unwrap(),
            report(seq)
        );
    }
}
