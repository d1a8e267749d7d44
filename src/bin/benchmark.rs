use xs1dec::decode::decode_all;

fn timed<F: FnMut()>(name: &'static str, mut target: F) {
    let start = time::now();
    target();
    let duration = time::now() - start;
    println!("{} finished in {}ms", name, duration.num_milliseconds());
}

pub fn main() {
    let code = [
        0xdd, 0xa6,             // mkmsk r3, 1
        0x9d, 0x5d,             // ldw r6, sp[0x1d]
        0x01, 0xf0, 0x83, 0x68, // ldc r2, 0x43
        0x1b, 0xf8, 0xec, 0x07, // stw r1, r2[r3]
        0x1c, 0x14,             // add r5, r11, r4
    ];

    let mut count = 0;
    timed("100,000 loops (500,000 instructions)", || {
        for _ in 0..100_000 {
            count += decode_all(&code[..]).filter(|r| r.result.is_ok()).count();
        }
    });

    println!("{} instructions decoded", count);
}
