//! Two consumers, one producer: show how marking a consumer ignoring frees
//! the producer from waiting on it.

use ring_disruptor::{Disruptor, DisruptorConfig};

const SHM_NAME: &str = "/ring-disruptor-demo-ignore";
const NUM_ELEMENTS: u32 = 4;
const ELEMENT_SIZE: u32 = 1;

fn main() {
    tracing_subscriber::fmt::init();

    let init_cfg = DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE)
        .with_consumer(2, 0)
        .with_init(true);
    let bootstrap = Disruptor::new(init_cfg).expect("create shared region");

    let mut producer = Disruptor::new(
        DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE).with_consumer(2, 0),
    )
    .expect("open shared region as producer");

    // Fill the ring.
    for _ in 0..NUM_ELEMENTS {
        let claimed = producer.produce_claim();
        assert!(claimed.seq.is_some());
        producer.produce_commit(None);
    }

    // Consumer 0 catches up fully; consumer 1 never reads, so a fifth
    // claim still fails on consumer 1's headroom alone.
    let mut consumer0 = Disruptor::new(
        DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE).with_consumer(2, 0),
    )
    .expect("open shared region as consumer 0");
    loop {
        let (_, slices) = consumer0.consume_new();
        if slices.is_empty() {
            break;
        }
        drop(slices);
        consumer0.consume_commit();
    }

    let stuck = producer.produce_claim();
    assert!(stuck.seq.is_none(), "ring is full: consumer 1 hasn't advanced");

    // Consumer 1 releases itself as ignoring instead of catching up.
    let consumer1 = Disruptor::new(
        DisruptorConfig::new(SHM_NAME, NUM_ELEMENTS, ELEMENT_SIZE).with_consumer(2, 1),
    )
    .expect("open shared region as consumer 1");
    consumer1.release(true);

    let unstuck = producer.produce_claim();
    assert!(unstuck.seq.is_some(), "producer proceeds once consumer 1 is ignoring");

    drop(bootstrap);
    drop(producer);
    unsafe {
        let name = std::ffi::CString::new(SHM_NAME).unwrap();
        libc::shm_unlink(name.as_ptr());
    }
}
