use bencher::{TestCase, TestFile};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_wire_http::codec::{MessageParser, ParseHandler, ParserState};
use micro_wire_http::protocol::ParseError;
use std::hint::black_box;

static SMALL_HEADER: TestFile = TestFile::new("get_small.txt", include_bytes!("../resources/request/get_small.txt"));
static LARGE_HEADER: TestFile = TestFile::new("get_large.txt", include_bytes!("../resources/request/get_large.txt"));
static CHUNKED_BODY: TestFile = TestFile::new("post_chunked.txt", include_bytes!("../resources/request/post_chunked.txt"));
static JSON_RESPONSE: TestFile = TestFile::new("json_ok.txt", include_bytes!("../resources/response/json_ok.txt"));

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::request("small_header", SMALL_HEADER),
        TestCase::request("large_header", LARGE_HEADER),
        TestCase::request("large_header_16b_fragments", LARGE_HEADER).fragmented(16),
        TestCase::request("chunked_body", CHUNKED_BODY),
        TestCase::request("chunked_body_byte_by_byte", CHUNKED_BODY).fragmented(1),
        TestCase::response("json_response", JSON_RESPONSE),
    ]
}

#[derive(Default)]
struct Discard {
    headers: usize,
    body_bytes: usize,
}

impl ParseHandler for Discard {
    fn on_first_line(&mut self, line: &str) -> Result<(), ParseError> {
        black_box(line);
        Ok(())
    }

    fn on_header(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        black_box((name, value));
        self.headers += 1;
        Ok(())
    }

    fn on_body_part(&mut self, data: &[u8]) -> Result<(), ParseError> {
        self.body_bytes += data.len();
        Ok(())
    }

    fn on_complete(&mut self) -> Result<(), ParseError> {
        Ok(())
    }
}

fn benchmark_message_parser(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("message_parser");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.file().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            let mut parser = MessageParser::default();
            b.iter(|| {
                parser.initialize(case.group().trailing_bytes_as_body());
                let mut handler = Discard::default();
                for fragment in case.fragments() {
                    parser.insert_all(fragment, &mut handler).expect("fixture should be a valid http message");
                }
                if parser.state() != ParserState::Complete {
                    parser.connection_closed(&mut handler).expect("fixture should end at the message end");
                }
                black_box((handler.headers, handler.body_bytes));
            });
        });
    }

    group.finish();
}

criterion_group!(parser, benchmark_message_parser);
criterion_main!(parser);
