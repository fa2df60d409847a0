//! Cancellation and timeout tests.
//!
//! Both cancellation paths — a local abort signal and an inbound
//! `notifications/cancelled` — and the timeout path that converges on the
//! same cleanup.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::StreamExt as _;
use serde_json::{Value, json};
use tandem::{
    AbortController, Error, Message, Notification, Protocol, ProtocolOptions, Request,
    RequestOptions, Response, TransportSender as _,
};
use tokio::task::LocalSet;

fn protocol() -> Protocol {
    Protocol::new(
        |fut| {
            tokio::task::spawn_local(fut);
        },
        ProtocolOptions::default(),
    )
}

async fn connect_raw(
    protocol: &Protocol,
) -> (tandem::ChannelSender, tandem::MessageStream) {
    use tandem::Transport as _;

    let (near, far) = tandem::pair();
    let io = protocol.connect(near).unwrap();
    tokio::task::spawn_local(io);
    far.start().await.unwrap()
}

/// Asserts nothing arrives on the far side for a little while.
async fn assert_quiet(far_rx: &mut tandem::MessageStream) {
    let next = tokio::time::timeout(Duration::from_millis(50), far_rx.next()).await;
    assert!(next.is_err(), "unexpected frame: {next:?}");
}

// ============================================================================
// Local abort
// ============================================================================

#[tokio::test(flavor = "current_thread")]
async fn abort_rejects_and_sends_one_cancellation() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let (_far_tx, mut far_rx) = connect_raw(&client).await;

            let controller = AbortController::new();
            let request_task = tokio::task::spawn_local({
                let client = client.clone();
                let signal = controller.signal();
                async move {
                    client
                        .request::<Value>(
                            "slow",
                            None,
                            RequestOptions::default().signal(signal),
                        )
                        .await
                }
            });

            let Message::Request(request) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            let id = request.id.as_number().unwrap();

            controller.abort(Error::request_cancelled(Some("user walked away")));

            let error = request_task.await.unwrap().unwrap_err();
            assert_eq!(error.code, tandem::error::REQUEST_CANCELLED);
            assert_eq!(error.message, "user walked away");

            let Message::Notification(cancelled) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected cancellation notification");
            };
            assert_eq!(cancelled.method, tandem::CANCELLED_METHOD);
            assert_eq!(cancelled.params.as_ref().unwrap()["requestId"], json!(id));

            // exactly one
            assert_quiet(&mut far_rx).await;
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn already_aborted_signal_rejects_before_sending() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let (_far_tx, mut far_rx) = connect_raw(&client).await;

            let controller = AbortController::new();
            controller.abort(Error::request_cancelled(Some("too late")));

            let error = client
                .request::<Value>(
                    "slow",
                    None,
                    RequestOptions::default().signal(controller.signal()),
                )
                .await
                .unwrap_err();
            assert_eq!(error.message, "too late");

            // nothing ever reached the wire
            assert_quiet(&mut far_rx).await;
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn abort_after_response_is_a_noop() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let (mut far_tx, mut far_rx) = connect_raw(&client).await;

            let controller = AbortController::new();
            let request_task = tokio::task::spawn_local({
                let client = client.clone();
                let signal = controller.signal();
                async move {
                    client
                        .request::<Value>(
                            "fast",
                            None,
                            RequestOptions::default().signal(signal),
                        )
                        .await
                }
            });

            let Message::Request(request) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            far_tx
                .send(Message::Response(Response::new(request.id, json!({}))))
                .await
                .unwrap();

            let result = request_task.await.unwrap();
            assert!(result.is_ok());

            // a late abort neither double-settles nor reaches the peer
            controller.abort(Error::request_cancelled(None));
            assert_quiet(&mut far_rx).await;
        })
        .await;
}

// ============================================================================
// Timeouts
// ============================================================================

#[tokio::test(flavor = "current_thread")]
async fn timeout_rejects_and_notifies_peer() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let (_far_tx, mut far_rx) = connect_raw(&client).await;

            let error = client
                .request::<Value>(
                    "slow",
                    None,
                    RequestOptions::default().timeout(Duration::from_millis(50)),
                )
                .await
                .unwrap_err();

            assert_eq!(error.code, tandem::error::REQUEST_TIMEOUT);
            assert_eq!(error.data, Some(json!({ "timeout": 50 })));

            let Message::Request(_) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            let Message::Notification(cancelled) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected cancellation notification");
            };
            assert_eq!(cancelled.method, tandem::CANCELLED_METHOD);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn response_inside_deadline_wins_the_race() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let (mut far_tx, mut far_rx) = connect_raw(&client).await;

            let request_task = tokio::task::spawn_local({
                let client = client.clone();
                async move {
                    client
                        .request::<Value>(
                            "timed",
                            None,
                            RequestOptions::default().timeout(Duration::from_millis(200)),
                        )
                        .await
                }
            });

            let Message::Request(request) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected request");
            };
            tokio::time::sleep(Duration::from_millis(20)).await;
            far_tx
                .send(Message::Response(Response::new(
                    request.id,
                    json!({ "made": "it" }),
                )))
                .await
                .unwrap();

            let result = request_task.await.unwrap().unwrap();
            assert_eq!(result, json!({ "made": "it" }));

            // the timer was cancelled along with the request
            assert_quiet(&mut far_rx).await;
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn late_response_after_timeout_is_reported_not_delivered() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let client = protocol();
            let errors = Rc::new(RefCell::new(Vec::new()));
            client.set_on_error({
                let errors = errors.clone();
                move |error| errors.borrow_mut().push(error)
            });

            let (mut far_tx, mut far_rx) = connect_raw(&client).await;

            let error = client
                .request::<Value>(
                    "slow",
                    None,
                    RequestOptions::default().timeout(Duration::from_millis(30)),
                )
                .await
                .unwrap_err();
            assert_eq!(error.code, tandem::error::REQUEST_TIMEOUT);

            let Message::Request(request) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected request");
            };

            // the response shows up well after the deadline
            far_tx
                .send(Message::Response(Response::new(request.id, json!({}))))
                .await
                .unwrap();
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }

            // surfaced as an unknown-id condition, nothing more
            assert_eq!(errors.borrow().len(), 1);
        })
        .await;
}

// ============================================================================
// Inbound cancellation
// ============================================================================

#[tokio::test(flavor = "current_thread")]
async fn cancelled_notification_aborts_the_handler_and_suppresses_the_reply() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let server = protocol();
            let observed_reason = Rc::new(RefCell::new(None));

            server
                .set_request_handler("slow", {
                    let observed_reason = observed_reason.clone();
                    move |_params: Value, cx: tandem::RequestCx| {
                        let observed_reason = observed_reason.clone();
                        async move {
                            cx.signal.aborted().await;
                            *observed_reason.borrow_mut() = cx.signal.reason();
                            // keep going anyway; the engine must discard this
                            Ok(json!({ "finished": true }))
                        }
                    }
                })
                .unwrap();

            let (mut far_tx, mut far_rx) = connect_raw(&server).await;

            far_tx
                .send(Message::Request(Request::new(7, "slow", None)))
                .await
                .unwrap();
            tokio::task::yield_now().await;

            far_tx
                .send(Message::Notification(Notification::new(
                    tandem::CANCELLED_METHOD,
                    Some(json!({ "requestId": 7, "reason": "peer lost interest" })),
                )))
                .await
                .unwrap();

            // no response may be sent for the aborted request
            assert_quiet(&mut far_rx).await;

            let reason = observed_reason.borrow().clone().unwrap();
            assert_eq!(reason.message, "peer lost interest");
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn cancelled_notification_for_unknown_request_is_ignored() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let server = protocol();
            let (mut far_tx, mut far_rx) = connect_raw(&server).await;

            far_tx
                .send(Message::Notification(Notification::new(
                    tandem::CANCELLED_METHOD,
                    Some(json!({ "requestId": 99 })),
                )))
                .await
                .unwrap();

            // still alive: ping answers
            far_tx
                .send(Message::Request(Request::new(1, "ping", None)))
                .await
                .unwrap();
            let Message::Response(response) = far_rx.next().await.unwrap().unwrap() else {
                panic!("expected pong");
            };
            assert_eq!(response.result, json!({}));
        })
        .await;
}
