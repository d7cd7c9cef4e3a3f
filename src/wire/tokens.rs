//! Protocol tokens
//!
//! Every protocol line starts with one of these `>Token<` markers. The
//! values are fixed by the debug clients and must not change.

// === Requests (server -> client) ===
pub const REQUEST_OK: &str = ">OK?<";
pub const REQUEST_ENV: &str = ">Environment<";
pub const REQUEST_CAPABILITIES: &str = ">Capabilities<";
pub const REQUEST_LOAD: &str = ">Load<";
pub const REQUEST_RUN: &str = ">Run<";
pub const REQUEST_COVERAGE: &str = ">Coverage<";
pub const REQUEST_PROFILE: &str = ">Profile<";
pub const REQUEST_CONTINUE: &str = ">Continue<";
pub const REQUEST_STEP: &str = ">Step<";
pub const REQUEST_STEP_OVER: &str = ">StepOver<";
pub const REQUEST_STEP_OUT: &str = ">StepOut<";
pub const REQUEST_STEP_QUIT: &str = ">StepQuit<";
pub const REQUEST_BREAK: &str = ">Break<";
pub const REQUEST_BREAK_ENABLE: &str = ">EnableBreak<";
pub const REQUEST_BREAK_IGNORE: &str = ">IgnoreBreak<";
pub const REQUEST_WATCH: &str = ">Watch<";
pub const REQUEST_WATCH_ENABLE: &str = ">EnableWatch<";
pub const REQUEST_WATCH_IGNORE: &str = ">IgnoreWatch<";
pub const REQUEST_VARIABLES: &str = ">Variables<";
pub const REQUEST_VARIABLE: &str = ">Variable<";
pub const REQUEST_SET_FILTER: &str = ">SetFilter<";
pub const REQUEST_THREAD_LIST: &str = ">ThreadList<";
pub const REQUEST_THREAD_SET: &str = ">ThreadSet<";
pub const REQUEST_EVAL: &str = ">Eval<";
pub const REQUEST_EXEC: &str = ">Exec<";
pub const REQUEST_SHUTDOWN: &str = ">Shutdown<";
pub const REQUEST_BANNER: &str = ">Banner<";
pub const REQUEST_COMPLETION: &str = ">Completion<";
pub const REQUEST_UT_PREPARE: &str = ">UTPrepare<";
pub const REQUEST_UT_RUN: &str = ">UTRun<";
pub const REQUEST_UT_STOP: &str = ">UTStop<";
pub const REQUEST_FORK_TO: &str = ">ForkTo<";
pub const REQUEST_FORK_MODE: &str = ">ForkMode<";
pub const REQUEST_CALL_TRACE: &str = ">CallTrace<";

// === Responses (client -> server) ===
pub const RESPONSE_OK: &str = ">OK<";
pub const RESPONSE_CONTINUE: &str = ">Continue<";
pub const RESPONSE_EXCEPTION: &str = ">Exception<";
pub const RESPONSE_SYNTAX: &str = ">SyntaxError<";
pub const RESPONSE_SIGNAL: &str = ">Signal<";
pub const RESPONSE_EXIT: &str = ">Exit<";
pub const RESPONSE_LINE: &str = ">Line<";
pub const RESPONSE_STACK: &str = ">CurrentStack<";
pub const RESPONSE_RAW: &str = ">Raw<";
pub const RESPONSE_CLEAR_BREAK: &str = ">ClearBreak<";
pub const RESPONSE_BP_CONDITION_ERROR: &str = ">BPConditionError<";
pub const RESPONSE_CLEAR_WATCH: &str = ">ClearWatch<";
pub const RESPONSE_WP_CONDITION_ERROR: &str = ">WPConditionError<";
pub const RESPONSE_VARIABLES: &str = ">Variables<";
pub const RESPONSE_VARIABLE: &str = ">Variable<";
pub const RESPONSE_THREAD_LIST: &str = ">ThreadList<";
pub const RESPONSE_THREAD_SET: &str = ">ThreadSet<";
pub const RESPONSE_BANNER: &str = ">Banner<";
pub const RESPONSE_CAPABILITIES: &str = ">Capabilities<";
pub const RESPONSE_COMPLETION: &str = ">Completion<";
pub const RESPONSE_UT_PREPARED: &str = ">UTPrepared<";
pub const RESPONSE_UT_START_TEST: &str = ">UTStartTest<";
pub const RESPONSE_UT_STOP_TEST: &str = ">UTStopTest<";
pub const RESPONSE_UT_TEST_FAILED: &str = ">UTTestFailed<";
pub const RESPONSE_UT_TEST_ERRORED: &str = ">UTTestErrored<";
pub const RESPONSE_UT_TEST_SKIPPED: &str = ">UTTestSkipped<";
pub const RESPONSE_UT_TEST_FAILED_EXPECTED: &str = ">UTTestFailedExpected<";
pub const RESPONSE_UT_TEST_SUCCEEDED_UNEXPECTED: &str = ">UTTestSucceededUnexpected<";
pub const RESPONSE_UT_FINISHED: &str = ">UTFinished<";
pub const RESPONSE_FORK_TO: &str = ">ForkTo<";
pub const PASSIVE_STARTUP: &str = ">PassiveStartup<";
pub const CALL_TRACE: &str = ">CallTrace<";

/// Chunk terminator: nothing further is buffered on the sending side
pub const EOT: &str = ">EOT<";

/// Every token a client may send, used to build response dispatch tables
pub const RESPONSE_TOKENS: &[&str] = &[
    RESPONSE_OK,
    RESPONSE_CONTINUE,
    RESPONSE_EXCEPTION,
    RESPONSE_SYNTAX,
    RESPONSE_SIGNAL,
    RESPONSE_EXIT,
    RESPONSE_LINE,
    RESPONSE_STACK,
    RESPONSE_RAW,
    RESPONSE_CLEAR_BREAK,
    RESPONSE_BP_CONDITION_ERROR,
    RESPONSE_CLEAR_WATCH,
    RESPONSE_WP_CONDITION_ERROR,
    RESPONSE_VARIABLES,
    RESPONSE_VARIABLE,
    RESPONSE_THREAD_LIST,
    RESPONSE_THREAD_SET,
    RESPONSE_BANNER,
    RESPONSE_CAPABILITIES,
    RESPONSE_COMPLETION,
    RESPONSE_UT_PREPARED,
    RESPONSE_UT_START_TEST,
    RESPONSE_UT_STOP_TEST,
    RESPONSE_UT_TEST_FAILED,
    RESPONSE_UT_TEST_ERRORED,
    RESPONSE_UT_TEST_SKIPPED,
    RESPONSE_UT_TEST_FAILED_EXPECTED,
    RESPONSE_UT_TEST_SUCCEEDED_UNEXPECTED,
    RESPONSE_UT_FINISHED,
    RESPONSE_FORK_TO,
    PASSIVE_STARTUP,
    CALL_TRACE,
];
