// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Filter behavior through the full pipeline.

mod common;

use common::*;
use oemcodec::{
    Filter, HeaderFormat, MeasurementSource, MessageData, MessageMetadata, Parser, Status,
};

fn stream_of_bestpos(times_ms: &[u32]) -> Vec<u8> {
    let db = test_db();
    let mut input = Vec::new();
    for &ms in times_ms {
        let header = HeaderFields::new(42)
            .with_definition_crc(&db, "BESTPOS")
            .with_time(2200, ms);
        input.extend_from_slice(&binary_frame(&header, &bestpos_body()));
    }
    input
}

fn run_filtered(input: &[u8], filter: Filter) -> Vec<MessageMetadata> {
    let mut parser = Parser::new(test_db());
    parser.set_filter(filter);
    parser.write(input);

    let mut results = Vec::new();
    let mut message = MessageData::default();
    let mut metadata = MessageMetadata::default();
    loop {
        match parser.read(&mut message, &mut metadata) {
            Status::Success => results.push(metadata.clone()),
            Status::BufferEmpty => break,
            status => panic!("unexpected status {status}"),
        }
    }
    results
}

#[test]
fn decimation_admits_on_period_messages() {
    let input = stream_of_bestpos(&[0, 250, 500, 750, 1000, 1250, 1500]);

    let mut filter = Filter::new();
    filter.set_include_decimation(0.5);
    let admitted = run_filtered(&input, filter);
    let times: Vec<u32> = admitted.iter().map(|m| m.milliseconds as u32).collect();
    assert_eq!(times, vec![0, 500, 1000, 1500]);

    let mut inverted = Filter::new();
    inverted.set_include_decimation(0.5);
    inverted.invert_decimation_filter(true);
    let admitted = run_filtered(&input, inverted);
    let times: Vec<u32> = admitted.iter().map(|m| m.milliseconds as u32).collect();
    assert_eq!(times, vec![250, 750, 1250]);
}

#[test]
fn filter_is_idempotent_over_a_stream() {
    let input = stream_of_bestpos(&[0, 250, 500, 750, 1000]);

    let mut filter = Filter::new();
    filter.set_include_decimation(0.5);

    // First pass: decode, filter, re-encode to binary.
    let options = oemcodec::ParserOptions {
        encode_format: oemcodec::EncodeFormat::Binary,
        ..Default::default()
    };
    let mut parser = Parser::with_options(test_db(), options.clone()).unwrap();
    parser.set_filter(filter.clone());
    parser.write(&input);

    let mut first_pass = Vec::new();
    let mut message = MessageData::default();
    let mut metadata = MessageMetadata::default();
    loop {
        match parser.read(&mut message, &mut metadata) {
            Status::Success => first_pass.extend_from_slice(message.message()),
            Status::BufferEmpty => break,
            status => panic!("unexpected status {status}"),
        }
    }

    // Second pass over the filtered stream yields the same stream.
    let mut parser = Parser::with_options(test_db(), options).unwrap();
    parser.set_filter(filter);
    parser.write(&first_pass);
    let mut second_pass = Vec::new();
    loop {
        match parser.read(&mut message, &mut metadata) {
            Status::Success => second_pass.extend_from_slice(message.message()),
            Status::BufferEmpty => break,
            status => panic!("unexpected status {status}"),
        }
    }
    assert_eq!(first_pass, second_pass);
}

#[test]
fn message_name_filter_selects_by_name() {
    use byteorder::{LittleEndian, WriteBytesExt};

    let db = test_db();
    let mut input = stream_of_bestpos(&[0]);
    let time_header = HeaderFields::new(101).with_definition_crc(&db, "TIME");
    let mut time_body = Vec::new();
    time_body.write_u32::<LittleEndian>(0).unwrap();
    time_body.write_f64::<LittleEndian>(1.5).unwrap();
    input.extend_from_slice(&binary_frame(&time_header, &time_body));

    let mut filter = Filter::new();
    filter.include_message_name("TIME", HeaderFormat::All, MeasurementSource::Primary);
    let admitted = run_filtered(&input, filter);
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].message_name, "TIME");

    let mut inverted = Filter::new();
    inverted.include_message_name("TIME", HeaderFormat::All, MeasurementSource::Primary);
    inverted.invert_message_name_filter(true);
    let admitted = run_filtered(&input, inverted);
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].message_name, "BESTPOS");
}

#[test]
fn message_id_filter_with_concrete_format() {
    let input = stream_of_bestpos(&[0]);

    // The triple names the binary format the frames actually use.
    let mut filter = Filter::new();
    filter.include_message_id(42, HeaderFormat::Binary, MeasurementSource::Primary);
    assert_eq!(run_filtered(&input, filter).len(), 1);

    // A triple for a different format admits nothing.
    let mut filter = Filter::new();
    filter.include_message_id(42, HeaderFormat::Ascii, MeasurementSource::Primary);
    assert!(run_filtered(&input, filter).is_empty());

    // ALL format matches the frame's format but still pins the source.
    let mut filter = Filter::new();
    filter.include_message_id(42, HeaderFormat::All, MeasurementSource::Secondary);
    assert!(run_filtered(&input, filter).is_empty());
}

#[test]
fn time_status_filter_through_pipeline() {
    let db = test_db();
    let mut input = Vec::new();
    for status in [
        oemcodec::TimeStatus::FineSteering,
        oemcodec::TimeStatus::Coarse,
    ] {
        let mut header = HeaderFields::new(42).with_definition_crc(&db, "BESTPOS");
        header.time_status = status;
        input.extend_from_slice(&binary_frame(&header, &bestpos_body()));
    }

    let mut filter = Filter::new();
    filter.include_time_status(oemcodec::TimeStatus::FineSteering);
    let admitted = run_filtered(&input, filter);
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].time_status, oemcodec::TimeStatus::FineSteering);
}
