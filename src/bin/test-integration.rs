use xs1dec::decode::{decode_all, Record};
use xs1dec::instruction::Mode;
use xs1dec::line::decode_line;

fn render(r: &Record) -> String {
    match r.result {
        Ok(ref i) => format!("{}@{}", i.architectural(), r.width),
        Err(ref e) => format!("<{}>@{}", e, r.width),
    }
}

fn run_test<F>(name: &'static str, code: &[u8], verify: F)
where F: Fn(&[Record]) -> bool {
    println!("Testing {}...", name);

    let records: Vec<Record> = decode_all(code).collect();

    if !verify(&records[..]) {
        println!("Failed! Decoded as:");
        for r in records.iter() {
            println!("  {:4x}: {}", r.offset, render(r));
        }
        panic!("test failure");
    }
}

macro_rules! test {
    ($name:expr, $prog:expr, $func:expr) => (
        run_test($name, &$prog[..], $func)
    )
}

fn names(rs: &[Record]) -> Vec<String> {
    rs.iter().map(render).collect()
}

pub fn main() {
test!("short forms",[0x1c,0x14,0xdd,0xa6,0x9d,0x5d,0xed,0x07,0xe5,0x07],|rs|{
	names(rs) == ["ADD_3r@2", "MKMSK_rus@2", "LDWSP_ru6@2", "CLRE_0r@2", "EDU_1r@2"]
});
test!("u6 and u10",[0x00,0x73,0x40,0x77,0xff,0xd7],|rs|{
	names(rs) == ["BRFU_u6@2", "ENTSP_u6@2", "BLRB_u10@2"]
});
test!("pfix",[0xff,0xf3,0xbf,0x68],|rs|{
	rs.len() == 1 &&
	rs[0].instruction().map(|i| i.architectural()) == Some("LDC_lru6".to_string()) &&
	rs[0].instruction().and_then(|i| i.operand("op2")) == Some(0xffff)
});
test!("pfix chain",[0x01,0xf0,0x02,0xf0,0x83,0x68],|rs|{
	rs.len() == 1 && rs[0].width == 6 &&
	rs[0].instruction().and_then(|i| i.operand("op2")) == Some(0x10083)
});
test!("pfix u6",[0x01,0xf0,0x40,0x77],|rs|{
	names(rs) == ["ENTSP_lu6@4"] &&
	rs[0].instruction().and_then(|i| i.operand("op1")) == Some(0x40)
});
test!("escape",[0x1b,0xf8,0xec,0x07],|rs|{
	names(rs) == ["STW_l3r@4"] &&
	rs[0].instruction().map(|i| i.values()) == Some(vec![1, 2, 3])
});
test!("unknown word resyncs",[0xff,0xff,0x1c,0x14],|rs|{
	names(rs) == ["<unknown encoding 0xffff>@2", "ADD_3r@2"]
});
test!("truncated tail",[0x1c,0x14,0x01,0xf0],|rs|{
	rs.len() == 2 && rs[1].offset == 2 && rs[1].width == 2 && rs[1].result.is_err()
});

    println!("Testing line modes...");
    let line = ".text 0x00010000: 9d 5d: ldw (ru6)   r6, sp[0x1d]";
    assert_eq!(decode_line("9d 5d", &Mode::Default).as_deref(), Some("ldw (ru6) r6, 0x1d"));
    assert_eq!(
        decode_line(line, &Mode::Substitute).as_deref(),
        Some(".text 0x00010000: 9d 5d: LDWSP_ru6   r6, sp[0x1d]")
    );
    assert_eq!(
        decode_line(line, &Mode::Merge(" ; ".to_string())).as_deref(),
        Some(".text 0x00010000: 9d 5d: ldw (ru6)   r6, sp[0x1d] ; LDWSP_ru6")
    );
}
