use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::datetime;
use crate::timer::{Timer, TimerState};

/// 表示を更新する間隔。
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// 計測中のタイマーの表示値を1秒ごとに再計算する繰り返しタスク。
///
/// `cancel`するか`Ticker`をdropすると、以後コールバックは呼ばれない。
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// 新しい`Ticker`を起動する。
    ///
    /// # Arguments
    ///
    /// * `timer` - 表示値の基準となるタイマー
    /// * `on_tick` - 表示値を受け取るコールバック
    pub fn spawn<F>(timer: Timer, mut on_tick: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                on_tick(timer.display_seconds(datetime::now()));
            }
        });

        Self { handle }
    }

    /// 繰り返しを止める。
    pub fn cancel(self) {}
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 1つのタスクのタイマー表示。
///
/// 状態が変わるたびに古い`Ticker`を止め、計測中であれば新しい基準値で`Ticker`を起動し直す。
pub struct TimerView {
    timer: Option<Timer>,
    ticker: Option<Ticker>,
    render: Arc<dyn Fn(&Timer, u64) + Send + Sync>,
}

impl TimerView {
    /// 新しい`TimerView`を返す。
    ///
    /// # Arguments
    ///
    /// * `render` - タイマーと表示値を描画する関数
    pub fn new<R>(render: R) -> Self
    where
        R: Fn(&Timer, u64) + Send + Sync + 'static,
    {
        Self {
            timer: None,
            ticker: None,
            render: Arc::new(render),
        }
    }

    /// 最新のタイマーを反映する。内容が変わっていなければ何もしない。
    pub fn apply(&mut self, timer: Timer) {
        if self.timer == Some(timer) {
            return;
        }
        if let Some(ticker) = self.ticker.take() {
            debug!("Cancelling display refresh for outdated timer state");
            ticker.cancel();
        }

        (self.render)(&timer, timer.display_seconds(datetime::now()));
        if let TimerState::Running { .. } = timer.state {
            let render = Arc::clone(&self.render);
            self.ticker = Some(Ticker::spawn(timer, move |seconds| render(&timer, seconds)));
        }
        self.timer = Some(timer);
    }

    /// 表示更新が動いているかどうか。
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use super::{Ticker, TimerView};
    use crate::datetime::mock_datetime;
    use crate::timer::{Timer, TimerState};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn(&Timer, u64) + Send + Sync + 'static) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        (values, move |_: &Timer, seconds: u64| sink.lock().unwrap().push(seconds))
    }

    /// 1秒ごとに表示値が通知される。
    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_every_second() {
        mock_datetime::set_mock_time(base_time() + chrono::Duration::seconds(5));
        let (values, sink) = recorder();
        let timer = Timer {
            elapsed: 10,
            state: TimerState::Running {
                started_at: base_time(),
            },
        };

        let ticker = Ticker::spawn(timer, move |seconds| sink(&timer, seconds));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        ticker.cancel();

        assert_eq!(*values.lock().unwrap(), vec![15, 15, 15]);
        mock_datetime::clear_mock_time();
    }

    /// 停止後はコールバックが呼ばれない。
    #[tokio::test(start_paused = true)]
    async fn test_ticker_does_not_fire_after_cancel() {
        let (values, sink) = recorder();

        let ticker = Ticker::spawn(Timer::new(), move |seconds| sink(&Timer::new(), seconds));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let fired = values.lock().unwrap().len();
        drop(ticker);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fired, 2);
        assert_eq!(values.lock().unwrap().len(), fired);
    }

    /// 計測中から一時停止に変わると表示更新が止まり、確定値が表示される。
    #[tokio::test(start_paused = true)]
    async fn test_timer_view_cancels_on_state_change() {
        mock_datetime::set_mock_time(base_time());
        let (values, sink) = recorder();
        let mut view = TimerView::new(sink);
        let running = Timer {
            elapsed: 100,
            state: TimerState::Running {
                started_at: base_time(),
            },
        };

        view.apply(running);
        assert!(view.is_ticking());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        view.apply(Timer {
            elapsed: 130,
            state: TimerState::Paused,
        });
        let after_pause = values.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!view.is_ticking());
        assert_eq!(values.lock().unwrap().len(), after_pause);
        assert_eq!(values.lock().unwrap().last(), Some(&130));
        mock_datetime::clear_mock_time();
    }

    /// 同じ状態を再度反映しても`Ticker`は起動し直さない。
    #[tokio::test(start_paused = true)]
    async fn test_timer_view_ignores_unchanged_state() {
        let (values, sink) = recorder();
        let mut view = TimerView::new(sink);

        view.apply(Timer::default());
        view.apply(Timer::default());

        assert!(!view.is_ticking());
        assert_eq!(*values.lock().unwrap(), vec![0]);
    }

    /// `TimerView`をdropすると表示更新も止まる。
    #[tokio::test(start_paused = true)]
    async fn test_timer_view_teardown() {
        let (values, sink) = recorder();
        let mut view = TimerView::new(sink);
        view.apply(Timer {
            elapsed: 0,
            state: TimerState::Running {
                started_at: Utc::now(),
            },
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        let fired = values.lock().unwrap().len();

        drop(view);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(values.lock().unwrap().len(), fired);
    }
}
