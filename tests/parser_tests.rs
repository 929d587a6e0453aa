use scadamon::parser::*;

fn parser() -> TelemetryParser {
    TelemetryParser::new()
}

#[test]
fn test_wire_example() {
    let reading = parser().parse_reading(b"0,25.50,1\n").unwrap();
    assert_eq!(reading, Reading { sensor_id: 0, temperature: 25.5, running: true });
}

#[test]
fn test_interlock_flag() {
    let reading = parser().parse_reading(b"3,61.20,0\n").unwrap();
    assert_eq!(reading.sensor_id, 3);
    assert!(!reading.running);
}

#[test]
fn test_malformed_lines_rejected() {
    let rejected: [&[u8]; 6] = [
        b"",
        b"\n",
        b"0,25.50\n",
        b"0,hot,1\n",
        b"0,NaN,1\n",
        b"0,25.50,on\n",
    ];
    for raw in rejected {
        assert_eq!(parser().parse(raw), ParsedFrame::default(), "accepted {:?}", raw);
    }
}

#[test]
fn test_critical_reading_with_odd_sensor_id_is_accepted() {
    // Only temperature and flag decide validity
    let odd_ids: [&[u8]; 3] = [b"S1,55.00,1\n", b"-1,55.00,1\n", b"0x1,55.00,1\n"];
    for raw in odd_ids {
        let reading = parser().parse_reading(raw).unwrap();
        assert_eq!(reading, Reading { sensor_id: 0, temperature: 55.0, running: true });
    }

    // Newest line wins even when its id is unusual
    let frame = parser().parse(b"0,30.00,1\nS1,55.00,0\n");
    let reading = frame.reading.unwrap();
    assert_eq!(reading.temperature, 55.0);
    assert!(!reading.running);
}

#[test]
fn test_whitespace_and_extra_fields_tolerated() {
    let reading = parse_line(" 0 , 25.5 , 1 ").unwrap();
    assert_eq!(reading.temperature, 25.5);
    let reading = parse_line("0,25.5,1,extra").unwrap();
    assert!(reading.running);
    assert_eq!(parse_line("0,-12.25,1").unwrap().temperature, -12.25);
}

#[test]
fn test_burst_yields_newest_valid_line() {
    let frame = parser().parse(b"0,20.00,1\r\n0,21.00,1\r\n0,22.0,1");
    // An unterminated tail still parses when all three fields are present
    assert_eq!(frame.reading.unwrap().temperature, 22.0);

    let frame = parser().parse(b"0,20.00,1\n0,21.00,1\n0,22");
    assert_eq!(frame.reading.unwrap().temperature, 21.0);
}

#[test]
fn test_error_sentinel_is_a_fault() {
    let frame = parser().parse(b"ERROR\n");
    assert_eq!(frame.reading, None);
    assert_eq!(frame.fault.as_deref(), Some("ERROR"));

    let frame = parser().parse(b"SENSOR ERROR 4\n");
    assert_eq!(frame.fault.as_deref(), Some("SENSOR ERROR 4"));
}

#[test]
fn test_fault_and_older_reading_in_one_burst() {
    let frame = parser().parse(b"0,30.00,1\nERROR: open circuit\n");
    assert_eq!(frame.reading.unwrap().temperature, 30.0);
    assert_eq!(frame.fault.as_deref(), Some("ERROR: open circuit"));

    // A fault older than the accepted reading is not reported
    let frame = parser().parse(b"ERROR: open circuit\n0,30.00,1\n");
    assert_eq!(frame.fault, None);
}

#[test]
fn test_invalid_utf8_dropped() {
    let frame = parser().parse(b"0,2\xff5.50,1\n");
    assert_eq!(frame.reading.unwrap().temperature, 25.5);
    let frame = parser().parse(b"\xfe\xfe\n0,19.00,1\n");
    assert_eq!(frame.reading.unwrap().temperature, 19.0);
}

#[test]
fn test_encode_line_matches_wire_format() {
    let line = encode_line(&Reading { sensor_id: 0, temperature: 25.5, running: true });
    assert_eq!(line, "0,25.50,1\n");
    let line = encode_line(&Reading { sensor_id: 2, temperature: -3.333, running: false });
    assert_eq!(line, "2,-3.33,0\n");
    assert_eq!(parse_line(line.trim()).unwrap().sensor_id, 2);
}
