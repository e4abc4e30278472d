//! Integration tests for the image format against real byte streams.

mod common;
use common::*;

use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};

use dynvm::{image, Const, Engine, Instr, Program, VmError};
use pretty_assertions::assert_eq;

fn sample_program() -> Program {
    Program {
        constants: vec![
            Const::Integer(-3),
            Const::Real(0.5),
            Const::Str("sample".into()),
            Const::Boolean(true),
            Const::Array {
                rows: 2,
                cols: 2,
                cells: vec![
                    Const::Integer(1),
                    Const::Integer(2),
                    Const::Str("three".into()),
                    Const::Boolean(false),
                ],
            },
        ],
        code: vec![
            Instr::AllocData(2),
            Instr::LoadConst(0),
            Instr::LoadConst(1),
            Instr::Add,
            Instr::StoreData(0),
            Instr::LoadData(0),
        ],
    }
}

#[test]
fn test_load_from_file() {
    let program = sample_program();
    let mut file = tempfile::tempfile().unwrap();
    image::write_program(&mut file, &program).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut engine = Engine::new();
    engine.load_program(&mut file).unwrap();
    // -3 + 0.5 = -2.5, truncated toward zero.
    assert_eq!(engine.run().unwrap(), -2);
}

#[test]
fn test_load_from_positioned_stream() {
    // The engine only requires the stream to be positioned at the image
    // start; leading bytes (e.g. an executable prefix) are the caller's
    // business.
    let program = sample_program();
    let mut bytes = vec![0xDE; 1024];
    image::write_program(&mut bytes, &program).unwrap();

    let mut cursor = Cursor::new(bytes);
    cursor.seek(SeekFrom::Start(1024)).unwrap();
    let mut engine = Engine::new();
    engine.load_program(&mut cursor).unwrap();
    assert_eq!(engine.run().unwrap(), -2);
}

#[test]
fn test_not_an_image_file() {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"#!/bin/sh\necho hello\n").unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    let mut engine = Engine::new();
    let err = engine.load_program(&mut file).unwrap_err();
    assert!(matches!(
        err,
        VmError::InvalidMagic | VmError::TruncatedImage
    ));
    assert_eq!(err.code(), 10001);
}

#[test]
fn test_value_tree_round_trip() {
    // Serializing a value tree through the image format and reloading it
    // yields an equal tree.
    let program = sample_program();
    let bytes = build_image(&program);
    let reloaded = image::read_program(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(reloaded, program);
}

#[test]
fn test_program_serializes_to_json() {
    // The parsed form is serde-serializable for tooling (disassembly).
    let program = sample_program();
    let json = serde_json::to_string(&program).unwrap();
    let back: Program = serde_json::from_str(&json).unwrap();
    assert_eq!(back, program);
}

#[test]
fn test_reloading_replaces_previous_program() {
    let mut engine = Engine::new();
    engine
        .load_program(&mut Cursor::new(build_image(&sample_program())))
        .unwrap();
    let second = Program {
        constants: vec![Const::Integer(9)],
        code: vec![Instr::LoadConst(0)],
    };
    engine
        .load_program(&mut Cursor::new(build_image(&second)))
        .unwrap();
    assert_eq!(engine.run().unwrap(), 9);
}
