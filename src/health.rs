//! `GET /healthcheck`, optionally tied to how fresh the last reading is.

use {
    crate::shutdown::Shutdown,
    log::{debug, info, warn},
    picoserve::{
        response::{IntoResponse, Json, StatusCode},
        routing::{get, PathRouter},
        Router,
    },
    serde::Serialize,
    std::{
        io,
        rc::Rc,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::{
        net::TcpListener,
        task,
        time::Instant,
    },
};

const BUFFER_SIZE: usize = 2048;

/// Freshness of the sampling loop, shared between it and the endpoint.
#[derive(Clone)]
pub struct Health {
    started: Instant,
    last_reading: Arc<Mutex<Option<Instant>>>,
    max_age: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Stale,
}

impl Health {
    /// Without `max_age` the endpoint reports ok for as long as the process
    /// is up.
    pub fn new(max_age: Option<Duration>) -> Self {
        Health {
            started: Instant::now(),
            last_reading: Arc::new(Mutex::new(None)),
            max_age,
        }
    }

    pub fn record_reading(&self) {
        *self.last_reading.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    pub fn last_reading_age(&self) -> Option<Duration> {
        self.last_reading
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|at| at.elapsed())
    }

    pub fn status(&self) -> Status {
        let max_age = match self.max_age {
            Some(max_age) => max_age,
            None => return Status::Ok,
        };

        // Before the first reading, measure from startup.
        let age = self
            .last_reading_age()
            .unwrap_or_else(|| self.started.elapsed());
        if age > max_age {
            Status::Stale
        } else {
            Status::Ok
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_reading_age_secs: Option<u64>,
}

fn healthcheck(health: &Health) -> impl IntoResponse {
    match health.status() {
        Status::Ok => Json(Body {
            status: "ok",
            last_reading_age_secs: None,
        })
        .into_response()
        .with_status_code(StatusCode::OK),
        Status::Stale => {
            let age = health.last_reading_age().map(|age| age.as_secs());
            warn!("Health check failing, last reading age {:?}", age);
            Json(Body {
                status: "stale",
                last_reading_age_secs: age,
            })
            .into_response()
            .with_status_code(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Only `GET /healthcheck` is routed; everything else gets the router's 404.
fn router(health: Health) -> Router<impl PathRouter> {
    Router::new().route(
        "/healthcheck",
        get(move || std::future::ready(healthcheck(&health))),
    )
}

fn config() -> picoserve::Config<Duration> {
    picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(1)),
    })
}

/// Serves until `shutdown` fires. Connections are handled on the current
/// `LocalSet`, so this must be spawned with `task::spawn_local`.
pub async fn serve(listener: TcpListener, health: Health, mut shutdown: Shutdown) -> io::Result<()> {
    info!("Health endpoint listening on {}", listener.local_addr()?);

    let app = Rc::new(router(health));
    let config = Rc::new(config());

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.recv() => break,
        };

        let app = app.clone();
        let config = config.clone();
        task::spawn_local(async move {
            match picoserve::serve(&*app, &*config, &mut [0; BUFFER_SIZE], stream).await {
                Ok(handled) => debug!("Served {} health request(s) to {}", handled, peer),
                Err(e) => debug!("Health request from {} failed: {:?}", peer, e),
            }
        });
    }

    info!("Health endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::shutdown,
        tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpStream,
            task::LocalSet,
        },
    };

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes())
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn reports_ok_and_stops_on_shutdown() {
        LocalSet::new()
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let (trigger, shutdown) = shutdown::channel();
                let server = task::spawn_local(serve(listener, Health::new(None), shutdown));

                let response = get(addr, "/healthcheck").await;
                assert!(response.starts_with("HTTP/1.1 200"));
                assert!(response.ends_with(r#"{"status":"ok"}"#));

                let response = get(addr, "/metrics").await;
                assert!(response.starts_with("HTTP/1.1 404"));

                trigger.fire();
                server.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn stale_loop_answers_503() {
        LocalSet::new()
            .run_until(async {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let health = Health::new(Some(Duration::from_millis(10)));
                health.record_reading();
                let (trigger, shutdown) = shutdown::channel();
                let server = task::spawn_local(serve(listener, health, shutdown));

                tokio::time::sleep(Duration::from_millis(50)).await;
                let response = get(addr, "/healthcheck").await;
                assert!(response.starts_with("HTTP/1.1 503"));
                assert!(response.ends_with(r#"{"status":"stale","lastReadingAgeSecs":0}"#));

                trigger.fire();
                server.await.unwrap().unwrap();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn goes_stale_without_readings() {
        let health = Health::new(Some(Duration::from_secs(60)));
        assert_eq!(health.status(), Status::Ok);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(health.status(), Status::Stale);

        health.record_reading();
        assert_eq!(health.status(), Status::Ok);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(health.last_reading_age(), Some(Duration::from_secs(30)));
        assert_eq!(health.status(), Status::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn never_stale_without_threshold() {
        let health = Health::new(None);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(health.status(), Status::Ok);
    }
}
