//! The host-function suite.
//!
//! Registration order is part of the compiled-program ABI: the compiler
//! emits CALLSYS indices against exactly this table, so new functions may
//! only be appended.

use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::{Color, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, SetTitle};
use crossterm::ExecutableCommand;
use rand::Rng;

use dynvm::{Engine, HostResult, ValueRef};

/// Register the full suite in ABI order.
pub fn bind_host_calls(engine: &mut Engine) {
    engine.append_host_call(Rc::new(write_output));
    engine.append_host_call(Rc::new(read_input));
    engine.append_host_call(Rc::new(to_number));
    engine.append_host_call(Rc::new(to_integer));
    engine.append_host_call(Rc::new(to_string));
    engine.append_host_call(Rc::new(floor));
    engine.append_host_call(Rc::new(ceiling));
    engine.append_host_call(Rc::new(array_rows));
    engine.append_host_call(Rc::new(array_cols));
    engine.append_host_call(Rc::new(random));
    engine.append_host_call(Rc::new(set_console_title));
    engine.append_host_call(Rc::new(set_background_color));
    engine.append_host_call(Rc::new(set_foreground_color));
    engine.append_host_call(Rc::new(set_cursor_position));
    engine.append_host_call(Rc::new(read_input_key));
    engine.append_host_call(Rc::new(read_gvar));
    engine.append_host_call(Rc::new(write_gvar));
    engine.append_host_call(Rc::new(time_ms));
    engine.append_host_call(Rc::new(newline));
}

fn write_output(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let mut stdout = io::stdout();
    for &arg in argv {
        let _ = stdout.write_all(engine.heap().as_display(arg).as_bytes());
    }
    let _ = stdout.flush();
    Ok(engine.heap().false_ref())
}

fn read_input(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    write_output(engine, argv)?;
    let token = read_token(&mut io::stdin().lock());
    Ok(engine.heap_mut().new_string(&token))
}

/// Read one whitespace-delimited token, skipping leading whitespace.
fn read_token(input: &mut impl Read) -> String {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 1];
    loop {
        match input.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if buf[0].is_ascii_whitespace() {
                    if bytes.is_empty() {
                        continue;
                    }
                    break;
                }
                bytes.push(buf[0]);
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn to_number(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let value = argv.first().map_or(0.0, |&arg| engine.heap().as_real(arg));
    Ok(engine.heap_mut().new_real(value))
}

fn to_integer(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let value = argv.first().map_or(0, |&arg| engine.heap().as_integer(arg));
    Ok(engine.heap_mut().new_integer(value))
}

fn to_string(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let units = argv.first().map_or_else(Vec::new, |&arg| engine.heap().as_units(arg));
    Ok(engine.heap_mut().new_string_units(&units))
}

fn floor(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let value = argv
        .first()
        .map_or(0, |&arg| engine.heap().as_real(arg).floor() as i64);
    Ok(engine.heap_mut().new_integer(value))
}

fn ceiling(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let value = argv
        .first()
        .map_or(0, |&arg| engine.heap().as_real(arg).ceil() as i64);
    Ok(engine.heap_mut().new_integer(value))
}

fn array_rows(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let rows = argv.first().map_or(0, |&arg| engine.heap().array_rows(arg));
    Ok(engine.heap_mut().new_integer(rows as i64))
}

fn array_cols(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let cols = argv.first().map_or(0, |&arg| engine.heap().array_cols(arg));
    Ok(engine.heap_mut().new_integer(cols as i64))
}

fn random(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    let mut rng = rand::thread_rng();
    let heap = engine.heap_mut();
    let result = match argv.len() {
        0 => heap.new_real(rng.gen::<f64>()),
        1 => {
            if heap.kind(argv[0]) == dynvm::ValueKind::Integer {
                let (lo, hi) = ordered_i64(0, heap.as_integer(argv[0]));
                heap.new_integer(rng.gen_range(lo..=hi))
            } else {
                let (lo, hi) = ordered_f64(0.0, heap.as_real(argv[0]));
                heap.new_real(sample_f64(&mut rng, lo, hi))
            }
        }
        _ => {
            if heap.kind(argv[0]) == dynvm::ValueKind::Integer {
                let (lo, hi) = ordered_i64(heap.as_integer(argv[0]), heap.as_integer(argv[1]));
                heap.new_integer(rng.gen_range(lo..=hi))
            } else {
                let (lo, hi) = ordered_f64(heap.as_real(argv[0]), heap.as_real(argv[1]));
                heap.new_real(sample_f64(&mut rng, lo, hi))
            }
        }
    };
    Ok(result)
}

fn ordered_i64(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn ordered_f64(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn sample_f64(rng: &mut impl Rng, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

fn set_console_title(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    match argv.first() {
        Some(&arg) => {
            let title = engine.heap().as_display(arg);
            let _ = io::stdout().execute(SetTitle(title));
            Ok(arg)
        }
        None => Ok(engine.heap_mut().new_string("")),
    }
}

fn set_background_color(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    match argv.first() {
        Some(&arg) => {
            let name = engine.heap().as_display(arg);
            if let Some(color) = color_from_name(&name) {
                let _ = io::stdout().execute(SetBackgroundColor(color));
            }
            Ok(engine.heap_mut().new_string(&name))
        }
        None => Ok(engine.heap_mut().new_string("")),
    }
}

fn set_foreground_color(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    match argv.first() {
        Some(&arg) => {
            let name = engine.heap().as_display(arg);
            if let Some(color) = color_from_name(&name) {
                let _ = io::stdout().execute(SetForegroundColor(color));
            }
            Ok(engine.heap_mut().new_string(&name))
        }
        None => Ok(engine.heap_mut().new_string("")),
    }
}

/// Map a surface-language color name to a terminal color.
fn color_from_name(name: &str) -> Option<Color> {
    let color = match name {
        "Black" => Color::Black,
        "DarkBlue" => Color::DarkBlue,
        "DarkGreen" => Color::DarkGreen,
        "DarkCyan" => Color::DarkCyan,
        "DarkRed" => Color::DarkRed,
        "DarkMagenta" => Color::DarkMagenta,
        "DarkYellow" => Color::DarkYellow,
        "DarkWhite" => Color::Grey,
        "Blue" => Color::Blue,
        "Green" => Color::Green,
        "Cyan" => Color::Cyan,
        "Red" => Color::Red,
        "Magenta" => Color::Magenta,
        "Yellow" => Color::Yellow,
        "White" => Color::White,
        _ => return None,
    };
    Some(color)
}

fn set_cursor_position(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    if argv.len() == 2 {
        let x = engine.heap().as_integer(argv[0]).clamp(0, u16::MAX as i64) as u16;
        let y = engine.heap().as_integer(argv[1]).clamp(0, u16::MAX as i64) as u16;
        let _ = io::stdout().execute(MoveTo(x, y));
    }
    Ok(engine.heap().true_ref())
}

fn read_input_key(engine: &mut Engine, _argv: &[ValueRef]) -> HostResult {
    let name = scan_key_name();
    Ok(engine.heap_mut().new_string(&name))
}

/// Drain pending key events without blocking and name the most recent
/// one; "None" when the queue is idle.
fn scan_key_name() -> String {
    let mut name = String::from("None");
    if enable_raw_mode().is_err() {
        return name;
    }
    while let Ok(true) = event::poll(Duration::ZERO) {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                name = key_name(key.code);
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = disable_raw_mode();
    name
}

/// Console-key naming convention of the source platform.
fn key_name(code: KeyCode) -> String {
    match code {
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Left => "LeftArrow".to_string(),
        KeyCode::Right => "RightArrow".to_string(),
        KeyCode::Up => "UpArrow".to_string(),
        KeyCode::Down => "DownArrow".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::Esc => "Escape".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        KeyCode::Char(' ') => "Spacebar".to_string(),
        KeyCode::Char(c) if c.is_ascii_digit() => format!("D{}", c),
        KeyCode::Char(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
        _ => "None".to_string(),
    }
}

fn read_gvar(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    match argv.first() {
        Some(&arg) => {
            let name = engine.heap().as_display(arg);
            Ok(engine.global_variable(&name))
        }
        None => Ok(engine.heap().false_ref()),
    }
}

fn write_gvar(engine: &mut Engine, argv: &[ValueRef]) -> HostResult {
    if argv.len() >= 2 {
        let name = engine.heap().as_display(argv[0]);
        engine.set_global_variable(&name, argv[1]);
        Ok(argv[1])
    } else {
        Ok(engine.heap().false_ref())
    }
}

fn time_ms(engine: &mut Engine, _argv: &[ValueRef]) -> HostResult {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64);
    Ok(engine.heap_mut().new_integer(millis))
}

fn newline(engine: &mut Engine, _argv: &[ValueRef]) -> HostResult {
    Ok(engine.heap_mut().new_string("\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_color_names() {
        assert_eq!(color_from_name("Red"), Some(Color::Red));
        assert_eq!(color_from_name("DarkYellow"), Some(Color::DarkYellow));
        assert_eq!(color_from_name("DarkWhite"), Some(Color::Grey));
        assert_eq!(color_from_name("Fuchsia"), None);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(KeyCode::Enter), "Enter");
        assert_eq!(key_name(KeyCode::Up), "UpArrow");
        assert_eq!(key_name(KeyCode::Char('a')), "A");
        assert_eq!(key_name(KeyCode::Char('7')), "D7");
        assert_eq!(key_name(KeyCode::Char(' ')), "Spacebar");
        assert_eq!(key_name(KeyCode::F(5)), "F5");
        assert_eq!(key_name(KeyCode::Null), "None");
    }

    #[test]
    fn test_read_token_skips_leading_whitespace() {
        let mut input = Cursor::new(b"   alpha beta".to_vec());
        assert_eq!(read_token(&mut input), "alpha");
        assert_eq!(read_token(&mut input), "beta");
        assert_eq!(read_token(&mut input), "");
    }

    #[test]
    fn test_registration_order() {
        // write_gvar must stay at index 16: compiled programs call by index.
        let mut engine = Engine::new();
        bind_host_calls(&mut engine);
        let program = dynvm::Program {
            constants: vec![
                dynvm::Const::Str("answer".into()),
                dynvm::Const::Integer(41),
                dynvm::Const::Integer(1),
            ],
            code: vec![
                // write_gvar("answer", 41): argv[0] is the top of stack.
                dynvm::Instr::LoadConst(1),
                dynvm::Instr::LoadConst(0),
                dynvm::Instr::CallHost { argc: 2, index: 16 },
                dynvm::Instr::Pop,
                // read_gvar("answer") + 1 => 42
                dynvm::Instr::LoadConst(0),
                dynvm::Instr::CallHost { argc: 1, index: 15 },
                dynvm::Instr::LoadConst(2),
                dynvm::Instr::Add,
                // to_integer(...) keeps the result an integer.
                dynvm::Instr::CallHost { argc: 1, index: 3 },
            ],
        };
        engine.load_image(program);
        assert_eq!(engine.run().unwrap(), 42);
    }

    #[test]
    fn test_random_ranges() {
        let mut engine = Engine::new();
        let lo = engine.heap_mut().constant_integer(3);
        let hi = engine.heap_mut().constant_integer(9);
        for _ in 0..50 {
            let r = random(&mut engine, &[lo, hi]).unwrap();
            let v = engine.heap().as_integer(r);
            assert!((3..=9).contains(&v), "{} out of range", v);
        }
        let x = engine.heap_mut().constant_real(2.0);
        for _ in 0..50 {
            let r = random(&mut engine, &[x]).unwrap();
            let v = engine.heap().as_real(r);
            assert!((0.0..2.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_conversions_handle_missing_args() {
        let mut engine = Engine::new();
        let n = to_number(&mut engine, &[]).unwrap();
        assert_eq!(engine.heap().as_real(n), 0.0);
        let i = to_integer(&mut engine, &[]).unwrap();
        assert_eq!(engine.heap().as_integer(i), 0);
        let s = to_string(&mut engine, &[]).unwrap();
        assert_eq!(engine.heap().as_display(s), "");
    }

    #[test]
    fn test_floor_and_ceiling() {
        let mut engine = Engine::new();
        let x = engine.heap_mut().constant_real(2.3);
        let f = floor(&mut engine, &[x]).unwrap();
        let c = ceiling(&mut engine, &[x]).unwrap();
        assert_eq!(engine.heap().as_integer(f), 2);
        assert_eq!(engine.heap().as_integer(c), 3);
    }

    #[test]
    fn test_array_shape_hosts() {
        let mut engine = Engine::new();
        let arr = engine.heap_mut().new_array(4, 2, None);
        let rows = array_rows(&mut engine, &[arr]).unwrap();
        let cols = array_cols(&mut engine, &[arr]).unwrap();
        assert_eq!(engine.heap().as_integer(rows), 4);
        assert_eq!(engine.heap().as_integer(cols), 2);
        let rows = array_rows(&mut engine, &[]).unwrap();
        assert_eq!(engine.heap().as_integer(rows), 0);
    }
}
