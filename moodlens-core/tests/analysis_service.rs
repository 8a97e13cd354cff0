use std::io::Read;
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tiny_http::{Header, Response, Server};

use moodlens_core::client::{AnalysisClient, AnalysisOutcome, ClientError, FrameAnalyzer};
use moodlens_core::pipeline::Pipeline;
use moodlens_core::rendering::OverlayRenderer;
use moodlens_core::video::RgbFrame;

type Captured = (String, String, String);

/// Answer exactly one request with `status` and `body`, handing the request
/// method, url and body back over the returned channel.  `None` when no local
/// port can be bound.
fn stub_service(status: u16, body: &'static str) -> Option<(String, mpsc::Receiver<Captured>)> {
    if TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("skipping test: cannot bind local port");
        return None;
    }
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        if let Ok(mut req) = server.recv() {
            let mut received = String::new();
            req.as_reader().read_to_string(&mut received).unwrap();
            let captured = (req.method().to_string(), req.url().to_string(), received);
            tx.send(captured).unwrap();
            let json = Header::from_bytes("Content-Type", "application/json").unwrap();
            let _ = req.respond(
                Response::from_string(body)
                    .with_status_code(status)
                    .with_header(json),
            );
        }
    });

    Some((format!("http://127.0.0.1:{port}/frame"), rx))
}

fn test_frame() -> RgbFrame {
    let mut frame = RgbFrame::solid(64, 48, [90, 120, 30]);
    frame.seq = 42;
    frame
}

#[test]
fn posts_base64_jpeg_and_parses_faces() {
    let Some((endpoint, rx)) = stub_service(
        200,
        r#"{"face": [{"box": [10, 12, 20, 22], "age": 33.2, "gender": "female",
            "genderScore": 0.8, "emotion": [{"score": 0.6, "emotion": "happy"}]}]}"#,
    ) else {
        return;
    };

    let mut client = AnalysisClient::new(endpoint);
    let outcome = client.analyze(&test_frame());

    let (method, url, json) = rx.recv().unwrap();
    assert_eq!(method, "POST");
    assert_eq!(url, "/frame");

    let body: serde_json::Value = serde_json::from_str(&json).unwrap();
    let object = body.as_object().unwrap();
    assert_eq!(object.len(), 1);
    let jpeg = STANDARD.decode(object["image"].as_str().unwrap()).unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    match outcome {
        AnalysisOutcome::Faces(result) => {
            assert_eq!(result.faces.len(), 1);
            assert_eq!(result.faces[0].age, Some(33.2));
            assert_eq!(result.faces[0].dominant_emotion().unwrap().emotion, "happy");
        }
        other => panic!("expected faces, got {other:?}"),
    }
}

#[test]
fn zero_faces_is_still_a_successful_answer() {
    let Some((endpoint, _rx)) = stub_service(200, r#"{"face": []}"#) else {
        return;
    };
    let outcome = AnalysisClient::new(endpoint).analyze(&test_frame());
    assert!(matches!(outcome, AnalysisOutcome::Faces(ref r) if r.is_empty()));
}

#[test]
fn non_200_renders_the_input_frame_unchanged() {
    let Some((endpoint, _rx)) = stub_service(500, "Error processing image") else {
        return;
    };
    let mut pipeline = Pipeline::new(
        AnalysisClient::new(endpoint),
        OverlayRenderer::without_labels(),
    );

    let mut frame = test_frame();
    let original = frame.clone();
    let outcome = pipeline.process(&mut frame);

    assert!(matches!(outcome, AnalysisOutcome::Rejected { status: 500 }));
    assert_eq!(frame, original);
}

#[test]
fn non_200_success_status_is_rejected() {
    let Some((endpoint, _rx)) = stub_service(204, "") else {
        return;
    };
    let outcome = AnalysisClient::new(endpoint).analyze(&test_frame());
    assert!(matches!(outcome, AnalysisOutcome::Rejected { status: 204 }));
}

#[test]
fn malformed_body_is_a_failure_not_a_crash() {
    let Some((endpoint, _rx)) = stub_service(200, r#"{"face": [{"box": "nope"}]}"#) else {
        return;
    };
    let mut pipeline = Pipeline::new(
        AnalysisClient::new(endpoint),
        OverlayRenderer::without_labels(),
    );
    let mut frame = test_frame();
    let original = frame.clone();
    let outcome = pipeline.process(&mut frame);

    assert!(matches!(outcome, AnalysisOutcome::Failed(ClientError::Decode(_))));
    assert_eq!(frame, original);
}

#[test]
fn faces_from_service_are_drawn() {
    let Some((endpoint, _rx)) = stub_service(
        200,
        r#"{"face": [{"box": [4, 4, 16, 16], "emotion": [{"score": 0.9, "emotion": "sad"}]}]}"#,
    ) else {
        return;
    };
    let mut pipeline = Pipeline::new(
        AnalysisClient::new(endpoint),
        OverlayRenderer::without_labels(),
    );
    let mut frame = RgbFrame::solid(32, 32, [0, 0, 0]);
    pipeline.process(&mut frame);

    let corner = (4 * 32 + 4) * 3;
    assert_eq!(&frame.data[corner..corner + 3], &[0, 0, 255]);
}
