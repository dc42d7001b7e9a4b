use crate::crawlers::spider::Spider;
use crate::driver::DriverFactory;
use crate::middleware::RequestPacer;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Runs `spider` over `urls` and returns a receiver that yields one output per URL.
///
/// `concurrency` workers share the queue and each holds at most one page, so
/// no more than `concurrency` pages are open at any time. Every page gets its own
/// browser session from `factory`; a session that cannot be opened still yields
/// an output through [`Spider::session_failed`]. The receiver closes once every
/// URL has been handled.
pub async fn start<S, F>(
    spider: Arc<S>,
    factory: Arc<F>,
    urls: Vec<String>,
    concurrency: usize,
    pacer: RequestPacer,
) -> mpsc::Receiver<S::Output>
where
    S: Spider,
    F: DriverFactory,
{
    let concurrency = concurrency.max(1);
    ::log::info!(
        "Starting {} pass over {} URLs with {} workers",
        spider.name(),
        urls.len(),
        concurrency
    );

    let (crawl_tx, crawl_rx) = mpsc::channel::<String>(urls.len().max(1));
    let (result_tx, result_rx) = mpsc::channel::<S::Output>(urls.len().max(1));

    for url in urls {
        if crawl_tx.send(url).await.is_err() {
            ::log::error!("Crawl queue closed before all URLs were queued");
            break;
        }
    }
    // Workers stop once the queue drains
    drop(crawl_tx);

    let crawl_rx = Arc::new(Mutex::new(crawl_rx));
    let pacer = Arc::new(pacer);

    let mut handles = Vec::with_capacity(concurrency);
    for worker_id in 0..concurrency {
        handles.push(tokio::spawn(worker_loop(
            worker_id,
            Arc::clone(&spider),
            Arc::clone(&factory),
            Arc::clone(&crawl_rx),
            result_tx.clone(),
            Arc::clone(&pacer),
        )));
    }
    drop(result_tx);

    let name = spider.name();
    tokio::spawn(async move {
        for handle in handles {
            if let Err(e) = handle.await {
                ::log::error!("Worker task failed: {}", e);
            }
        }
        ::log::info!("All {} {} workers have completed", concurrency, name);
    });

    result_rx
}

async fn worker_loop<S, F>(
    worker_id: usize,
    spider: Arc<S>,
    factory: Arc<F>,
    crawl_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    result_tx: mpsc::Sender<S::Output>,
    pacer: Arc<RequestPacer>,
) where
    S: Spider,
    F: DriverFactory,
{
    ::log::debug!("Worker {} starting processing loop", worker_id);

    while let Some(url) = next_url(worker_id, &crawl_rx).await {
        pacer.pause().await;

        let output = match factory.open().await {
            Ok(mut driver) => spider.process(driver.as_mut(), &url).await,
            Err(e) => {
                ::log::error!("Worker {} failed to open a page for {}: {}", worker_id, url, e);
                spider.session_failed(&url, &e)
            }
        };

        if result_tx.send(output).await.is_err() {
            ::log::warn!("Worker {} found the result channel closed", worker_id);
            break;
        }
    }

    ::log::debug!("Worker {} completed - no more URLs to process", worker_id);
}

async fn next_url(worker_id: usize, crawl_rx: &Arc<Mutex<mpsc::Receiver<String>>>) -> Option<String> {
    let url = crawl_rx.lock().await.recv().await;
    match &url {
        Some(url) => ::log::trace!("Worker {} processing: {}", worker_id, url),
        None => ::log::debug!("Worker {} found the queue empty", worker_id),
    }
    url
}
