//! Single-producer/single-consumer round trip over a shared-memory ring,
//! using `fork` so the two roles are genuinely separate processes.

use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult};

use ring_disruptor::{ClaimSlices, ConsumeSlices, Disruptor, DisruptorConfig};

const SHM_NAME: &str = "/ring-disruptor-demo-spsc";
const NUM_ELEMENTS: u32 = 64;
const ELEMENT_SIZE: u32 = 8;
const MESSAGES: u64 = 10_000;

fn main() {
    tracing_subscriber::fmt::init();

    let init_cfg = DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE)
        .with_consumer(1, 0)
        .with_init(true)
        .with_spin(true);
    // The initializer creates (and zero-fills) the region before either
    // role starts touching it.
    let _bootstrap = Disruptor::new(init_cfg).expect("create shared region");

    match unsafe { fork() }.expect("fork") {
        ForkResult::Parent { child } => {
            run_producer();
            waitpid(child, None).expect("wait for consumer");
        }
        ForkResult::Child => {
            run_consumer();
            std::process::exit(0);
        }
    }

    unsafe {
        let name = std::ffi::CString::new(SHM_NAME).unwrap();
        libc::shm_unlink(name.as_ptr());
    }
}

fn run_producer() {
    let cfg = DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE)
        .with_consumer(1, 0)
        .with_spin(true);
    let mut ring = Disruptor::new(cfg).expect("open shared region");

    for i in 0..MESSAGES {
        let claimed = ring.produce_claim();
        let (start, end) = claimed.seq.expect("spin mode always claims eventually");
        if let ClaimSlices::One(buf) = claimed.slices {
            buf.copy_from_slice(&i.to_le_bytes());
        }
        ring.produce_commit(Some((start, end)));
    }
}

fn run_consumer() {
    let cfg = DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE)
        .with_consumer(1, 0)
        .with_spin(true);
    let mut ring = Disruptor::new(cfg).expect("open shared region");

    let mut received = 0u64;
    while received < MESSAGES {
        let (_, slices) = ring.consume_new();
        let batch = slices.total_len() as u64 / ELEMENT_SIZE as u64;
        if let ConsumeSlices::One(buf) = &slices {
            if buf.len() == ELEMENT_SIZE as usize {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(buf);
                assert_eq!(u64::from_le_bytes(bytes), received);
            }
        }
        received += batch;
        drop(slices);
        ring.consume_commit();
    }
}
