use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swarmagents::{demo, ScriptedInvoker};
use swarmcore::{ChatMessage, RunId, Workflow};
use swarmruntime::WorkflowEngine;
use tracing::{error, info};

/// Application state shared across handlers
struct AppState {
    engine: WorkflowEngine,
    workflow: Arc<Workflow>,
}

/// Request body for a one-shot run
#[derive(Debug, Deserialize)]
struct RunRequest {
    messages: Vec<ChatMessage>,
}

/// Response for a completed run
#[derive(Debug, Serialize)]
struct RunResponse {
    run_id: RunId,
    output: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "swarmserver"
    }))
}

/// Run the workflow to completion, discarding intermediate events
#[post("/api/runs")]
async fn execute_run(
    data: web::Data<AppState>,
    req: web::Json<RunRequest>,
) -> ActixResult<impl Responder> {
    let messages = req.into_inner().messages;

    let stream = data
        .engine
        .run_stream(Arc::clone(&data.workflow), messages);
    let run_id = stream.run_id();
    info!(%run_id, "executing run");

    match stream.into_output().await {
        Ok(output) => {
            info!(%run_id, "run completed");
            Ok(HttpResponse::Ok().json(RunResponse { run_id, output }))
        }
        Err(e) => {
            error!(%run_id, "run failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// WebSocket endpoint streaming one run's events.
///
/// The first text frame is taken as the user prompt; run events are sent back
/// as JSON until the run ends. A close frame cancels the run.
#[get("/api/runs/stream")]
async fn stream_run(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let engine = data.engine.clone();
    let workflow = Arc::clone(&data.workflow);

    info!("WebSocket client connected");

    actix_web::rt::spawn(async move {
        let prompt = loop {
            match msg_stream.recv().await {
                Some(Ok(Message::Text(text))) => break text.to_string(),
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = session.close(None).await;
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) => return,
            }
        };

        let mut run = engine.run_stream(workflow, vec![ChatMessage::user(prompt)]);
        info!(run_id = %run.run_id(), "streaming run over WebSocket");

        loop {
            tokio::select! {
                event = run.next_event() => {
                    match event {
                        Some(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    run.cancel();
                                    break;
                                }
                            }
                        }
                        None => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                run.cancel();
                                break;
                            }
                        }
                        Message::Close(_) => {
                            run.cancel();
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 Starting Swarm Workflow Server");

    let delay = Duration::from_millis(200);
    let job_invoker = ScriptedInvoker::new(
        "1. Senior Python Engineer at Acme - 3+ years Python, distributed systems.",
    )
    .with_delay(delay);
    let cv_invoker = ScriptedInvoker::new(
        "1. Dana R. - 5 years Python, Django and asyncio, open-source contributor.",
    )
    .with_delay(delay);

    let workflow = Arc::new(demo::job_search_workflow(
        Arc::new(job_invoker),
        Arc::new(cv_invoker),
    )?);

    info!("✅ Demo workflow built");

    let app_state = web::Data::new(AppState {
        engine: WorkflowEngine::new(),
        workflow,
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(execute_run)
            .service(stream_run)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
