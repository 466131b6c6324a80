// 解析任务队列
//
// 上游对同一会话的并发鉴权请求有惩罚（限流甚至会话失效），因此
// 所有鉴权解析任务串行执行：全局仅一个在途任务，提交顺序即执行
// 顺序。队列以进程内组件的形式注入各路由，不使用全局单例。

use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 队列瞬时状态（背压观测用）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    /// 是否有任务在执行
    pub running: bool,
    /// 等待中的任务数
    pub queued: usize,
}

struct QueuedJob<T> {
    id: Uuid,
    future: BoxFuture<'static, anyhow::Result<T>>,
    reply: oneshot::Sender<anyhow::Result<T>>,
}

/// 任务结果句柄：队列执行完该任务后兑现其本身的成败
pub struct JobHandle<T> {
    /// 任务 id
    pub id: Uuid,
    rx: oneshot::Receiver<anyhow::Result<T>>,
}

impl<T> JobHandle<T> {
    /// 等待任务结果（成功或失败原样转发，队列不吞错误）
    pub async fn wait(self) -> anyhow::Result<T> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("解析队列已关闭，任务被丢弃"),
        }
    }
}

/// 单飞行解析队列：FIFO，并发上限恒为 1
///
/// 任务入队后不可撤销；任一任务结束（无论成败）后立即开始下一个
pub struct ResolverQueue<T> {
    tx: mpsc::UnboundedSender<QueuedJob<T>>,
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl<T: Send + 'static> ResolverQueue<T> {
    /// 创建队列并启动常驻 worker
    ///
    /// job_timeout 为单任务超时；超时任务以错误兑现并释放唯一在途名额，
    /// 避免上游挂起导致队列长期停摆
    pub fn new(job_timeout: Option<Duration>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedJob<T>>();
        let queued = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let worker_queued = Arc::clone(&queued);
        let worker_running = Arc::clone(&running);
        let worker_shutdown = shutdown.clone();

        tokio::spawn(async move {
            loop {
                let job = tokio::select! {
                    _ = worker_shutdown.cancelled() => break,
                    job = rx.recv() => match job {
                        Some(job) => job,
                        None => break,
                    },
                };

                worker_queued.fetch_sub(1, Ordering::SeqCst);
                worker_running.store(true, Ordering::SeqCst);
                debug!("解析任务开始执行: {}", job.id);

                let result = match job_timeout {
                    Some(limit) => match tokio::time::timeout(limit, job.future).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!("解析任务超时（{}秒）", limit.as_secs())),
                    },
                    None => job.future.await,
                };

                worker_running.store(false, Ordering::SeqCst);
                if let Err(ref e) = result {
                    warn!("解析任务失败: {}, error={}", job.id, e);
                } else {
                    debug!("解析任务完成: {}", job.id);
                }

                // 调用方可能已经放弃等待，忽略发送失败
                let _ = job.reply.send(result);
            }
            info!("解析队列 worker 退出");
        });

        Self {
            tx,
            queued,
            running,
            shutdown,
        }
    }

    /// 入队一个任务，返回其结果句柄
    ///
    /// 任务按提交顺序执行，前一个任务的失败不影响后续任务
    pub fn enqueue<F>(&self, job: F) -> JobHandle<T>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let id = Uuid::new_v4();

        self.queued.fetch_add(1, Ordering::SeqCst);
        let queued_job = QueuedJob {
            id,
            future: Box::pin(job),
            reply,
        };
        if self.tx.send(queued_job).is_err() {
            // worker 已退出：回退计数，句柄立即以关闭错误兑现
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }

        JobHandle { id, rx }
    }

    /// 当前队列状态
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            running: self.running.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
        }
    }

    /// 停止 worker；等待中的任务被丢弃，其句柄以关闭错误兑现
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_jobs_complete_in_submission_order() {
        let queue: ResolverQueue<u32> = ResolverQueue::new(None);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3u32 {
            let order = Arc::clone(&order);
            handles.push(queue.enqueue(async move {
                // 先提交的任务睡得更久，若并发执行则完成顺序会颠倒
                tokio::time::sleep(Duration::from_millis(30 - 10 * u64::from(i))).await;
                order.lock().push(i);
                Ok(i)
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.wait().await.unwrap(), i as u32);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_never_more_than_one_in_flight() {
        let queue: ResolverQueue<()> = ResolverQueue::new(None);
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(queue.enqueue(async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        for handle in handles {
            handle.wait().await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_forwarded_and_queue_advances() {
        let queue: ResolverQueue<&'static str> = ResolverQueue::new(None);

        let failing = queue.enqueue(async { anyhow::bail!("鉴权被拒绝") });
        let following = queue.enqueue(async { Ok("ok") });

        let err = failing.wait().await.unwrap_err();
        assert!(err.to_string().contains("鉴权被拒绝"));
        // 失败不阻塞后续任务
        assert_eq!(following.wait().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_status_reports_backpressure() {
        let queue: ResolverQueue<()> = ResolverQueue::new(None);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let blocker = queue.enqueue(async move {
            let _ = release_rx.await;
            Ok(())
        });
        let waiting = queue.enqueue(async { Ok(()) });

        // 等 worker 取走第一个任务
        tokio::time::sleep(Duration::from_millis(20)).await;
        let status = queue.status();
        assert!(status.running);
        assert_eq!(status.queued, 1);

        release_tx.send(()).unwrap();
        blocker.wait().await.unwrap();
        waiting.wait().await.unwrap();

        let status = queue.status();
        assert!(!status.running);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn test_job_timeout_frees_the_slot() {
        let queue: ResolverQueue<&'static str> =
            ResolverQueue::new(Some(Duration::from_millis(20)));

        let hung = queue.enqueue(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("unreachable")
        });
        let next = queue.enqueue(async { Ok("ran") });

        let err = hung.wait().await.unwrap_err();
        assert!(err.to_string().contains("超时"));
        assert_eq!(next.wait().await.unwrap(), "ran");
    }

    #[tokio::test]
    async fn test_shutdown_drops_pending_jobs() {
        let queue: ResolverQueue<()> = ResolverQueue::new(None);
        queue.shutdown();
        // 给 worker 一点时间退出
        tokio::time::sleep(Duration::from_millis(10)).await;

        let handle = queue.enqueue(async { Ok(()) });
        let err = handle.wait().await.unwrap_err();
        assert!(err.to_string().contains("已关闭"));
    }
}
