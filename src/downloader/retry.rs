// src/downloader/retry.rs

use crate::error::AppError;

/// 下载失败的分类，决定是否重试以及重试前的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 文件引用过期：重新获取消息后重试
    FileReferenceExpired,
    /// 超时：等待后重试
    Timeout,
    /// 下载后文件小于声明大小
    Incomplete,
    /// 下载后文件为空
    Empty,
    /// 其它错误：不再重试
    Fatal,
}

impl FailureClass {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::Fatal)
    }
}

impl From<&AppError> for FailureClass {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::FileReferenceExpired(_) => FailureClass::FileReferenceExpired,
            AppError::Timeout(_) => FailureClass::Timeout,
            AppError::Network(err)
            | AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(err))
                if err.is_timeout() =>
            {
                FailureClass::Timeout
            }
            AppError::IncompleteDownload { .. } => FailureClass::Incomplete,
            AppError::EmptyDownload(_) => FailureClass::Empty,
            _ => FailureClass::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// 正在进行第 n 次尝试 (从 1 开始)
    Attempting(u32),
    Succeeded,
    RetryableFailure { attempt: u32, reason: FailureClass },
    PermanentFailure { attempts: u32, reason: FailureClass },
}

/// 单条消息的重试状态机。
///
/// `Attempting(n)` 成功后进入 `Succeeded`；失败时，可重试且 n 小于上限则进入
/// `RetryableFailure`，否则进入 `PermanentFailure`。`retry` 将 `RetryableFailure`
/// 推进到 `Attempting(n + 1)`。终态不再变化。
#[derive(Debug, Clone)]
pub struct RetryMachine {
    max_attempts: u32,
    state: AttemptState,
}

impl RetryMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            state: AttemptState::Attempting(1),
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// 已开始的尝试次数
    pub fn attempts(&self) -> u32 {
        match self.state {
            AttemptState::Attempting(n) => n,
            AttemptState::RetryableFailure { attempt, .. } => attempt,
            AttemptState::PermanentFailure { attempts, .. } => attempts,
            AttemptState::Succeeded => 0,
        }
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            AttemptState::Succeeded | AttemptState::PermanentFailure { .. }
        )
    }

    pub fn succeed(&mut self) -> AttemptState {
        if let AttemptState::Attempting(_) = self.state {
            self.state = AttemptState::Succeeded;
        }
        self.state
    }

    pub fn fail(&mut self, reason: FailureClass) -> AttemptState {
        if let AttemptState::Attempting(n) = self.state {
            self.state = if reason.is_retryable() && n < self.max_attempts {
                AttemptState::RetryableFailure { attempt: n, reason }
            } else {
                AttemptState::PermanentFailure { attempts: n, reason }
            };
        }
        self.state
    }

    /// 进入下一次尝试，返回新的尝试序号
    pub fn retry(&mut self) -> Option<u32> {
        if let AttemptState::RetryableFailure { attempt, .. } = self.state {
            self.state = AttemptState::Attempting(attempt + 1);
            Some(attempt + 1)
        } else {
            None
        }
    }
}
