#![no_main]
use fileslice::{fileslice, DataType, ElementType, MemoryOrder, Selector};
use libfuzzer_sys::fuzz_target;
use ndarray::ArrayD;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let shape = [data[0] as usize % 9, data[1] as usize % 9];
    let spec = [
        Selector::Index(data[2] as i8 as isize),
        Selector::from(..(data[3] as i8 as isize)),
    ];
    let mut source = Cursor::new(&data[4..]);
    let _: Result<ArrayD<i16>, _> = fileslice(
        &mut source,
        &spec,
        &shape,
        ElementType::be(DataType::Int16),
        0,
        MemoryOrder::ColumnMajor,
    );
});
