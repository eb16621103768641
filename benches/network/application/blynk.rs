use blynk_device::network::application::blynk::{frame, Command, Link, MessageType};
use blynk_device::network::error::Error;
use blynk_device::network::{Close, Read, Timeout, Write};
use criterion::{BatchSize, Criterion, Throughput};
use std::hint::black_box;

/// Endless stream repeating one encoded frame.
struct Replay {
    frame: Vec<u8>,
    pos: usize,
}

impl Read for Replay {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            buf[n] = self.frame[self.pos];
            self.pos = (self.pos + 1) % self.frame.len();
            n += 1;
        }
        Ok(n)
    }
}

impl Write for Replay {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for Replay {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Timeout for Replay {
    type Error = Error;
    fn set_timeout(&mut self, _: u32) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.bench_function("virtual_write", |b| {
        b.iter(|| {
            frame::encode(
                MessageType::Hardware,
                black_box(42),
                &[&"vw", &black_box(3u8), &black_box(23.5f32)],
            )
            .expect("frame fits")
        })
    });
    group.bench_function("ping_response", |b| {
        b.iter(|| frame::encode_response(black_box(7), 200))
    });
    group.finish();
}

pub fn bench_parse_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_command");
    let vw = b"vw\x003\x001\x002\x003\x004";
    let pm = b"pm\x001\x00out\x002\x00in\x003\x00pu\x004\x00pd";
    group.throughput(Throughput::Bytes(vw.len() as u64));
    group.bench_function("virtual_write", |b| {
        b.iter(|| Command::from_bytes(black_box(vw)).expect("valid command"))
    });
    group.throughput(Throughput::Bytes(pm.len() as u64));
    group.bench_function("pin_mode", |b| {
        b.iter(|| Command::from_bytes(black_box(pm)).expect("valid command"))
    });
    group.finish();
}

pub fn bench_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("receive");
    let encoded = frame::encode(MessageType::Hardware, 9, &[&"vw", &1u8, &"hello"])
        .expect("frame fits")
        .to_vec();
    group.throughput(Throughput::Bytes(encoded.len() as u64 * 100));
    group.bench_function("header_and_payload", |b| {
        b.iter_batched_ref(
            || {
                let mut link = Link::new(20);
                link.attach(Replay {
                    frame: encoded.clone(),
                    pos: 0,
                });
                link
            },
            |link| {
                for _ in 0..100 {
                    let header = link.recv(5, 0).expect("read").expect("header");
                    let length = usize::from(u16::from_be_bytes([header[3], header[4]]));
                    black_box(link.recv(length, 1000).expect("read").expect("payload"));
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
