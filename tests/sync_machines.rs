use std::io;
use std::sync::{Arc, Mutex};

use fastfsm::{GenerationVariant, StateMachine};

#[fastfsm::fsm]
mod job {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum State {
        Idle,
        Working,
        Done,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Trigger {
        Start,
        Finish,
        Reset,
    }

    #[state_machine(state = State, trigger = Trigger)]
    #[transition(from = Idle, trigger = Start, to = Working, guard = "has_budget", action = "spend")]
    #[transition(from = Working, trigger = Finish, to = Done)]
    #[transition(from = Done, trigger = Reset, to = Idle)]
    #[state(state = Working, on_entry = "started", on_exit = "stopped")]
    pub struct Job {
        pub budget: u32,
        pub log: Vec<&'static str>,
    }

    impl Job {
        fn has_budget(&self) -> bool {
            self.budget > 0
        }

        fn spend(&mut self) {
            self.budget -= 1;
            self.log.push("spend");
        }

        fn started(&mut self) {
            self.log.push("enter Working");
        }

        fn stopped(&mut self) {
            self.log.push("exit Working");
        }
    }
}

#[fastfsm::fsm]
mod ticker {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum State {
        Running,
        Stopped,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Trigger {
        Tick,
        Stop,
    }

    #[state_machine(state = State, trigger = Trigger, structural_api = true)]
    #[internal_transition(state = Running, trigger = Tick, action = "count", guard = "below_limit")]
    #[transition(from = Running, trigger = Stop, to = Stopped)]
    #[state(state = Running, on_entry = "entered", on_exit = "left")]
    pub struct Ticker {
        pub ticks: u32,
        pub limit: u32,
        pub entries: u32,
        pub exits: u32,
    }

    impl Ticker {
        fn below_limit(&self) -> bool {
            self.ticks < self.limit
        }

        fn count(&mut self) {
            self.ticks += 1;
        }

        fn entered(&mut self) {
            self.entries += 1;
        }

        fn left(&mut self) {
            self.exits += 1;
        }
    }
}

#[fastfsm::fsm]
mod document {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum State {
        Draft,
        Saved,
        Published,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Trigger {
        Save,
        Publish,
    }

    #[state_machine(state = State, trigger = Trigger)]
    #[transition(from = Draft, trigger = Save, to = Saved, action = "persist")]
    #[transition(from = Draft, trigger = Publish, to = Published, guard = "approved")]
    pub struct Document {
        pub disk_full: bool,
        pub approval: Result<bool, String>,
    }

    impl Document {
        fn persist(&mut self) -> Result<(), String> {
            if self.disk_full {
                return Err("disk full".to_string());
            }
            Ok(())
        }

        fn approved(&self) -> Result<bool, String> {
            self.approval.clone()
        }
    }
}

#[fastfsm::fsm]
mod relay {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum State {
        Open,
        Closed,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Trigger {
        Toggle,
    }

    #[state_machine(state = State, trigger = Trigger)]
    #[transition(from = Open, trigger = Toggle, to = Closed)]
    #[transition(from = Closed, trigger = Toggle, to = Open)]
    pub struct Relay;
}

fn fire_all<M: StateMachine>(machine: &mut M, triggers: &[M::Trigger]) -> usize {
    let mut taken = 0;
    for trigger in triggers {
        if machine.try_fire(*trigger) {
            taken += 1;
        }
    }
    taken
}

#[test]
fn transitions_run_guard_exit_action_entry_in_order() {
    use job::{Job, State, Trigger};

    let mut machine = Job::new(State::Idle, 1, Vec::new());
    assert_eq!(machine.current_state(), State::Idle);

    assert!(machine.try_fire(Trigger::Start));
    assert_eq!(machine.current_state(), State::Working);
    assert_eq!(machine.log, vec!["spend", "enter Working"]);

    machine.fire(Trigger::Finish).unwrap();
    assert_eq!(machine.current_state(), State::Done);
    assert_eq!(machine.log, vec!["spend", "enter Working", "exit Working"]);
}

#[test]
fn failing_guard_leaves_state_untouched() {
    use job::{Job, State, Trigger};

    let mut machine = Job::new(State::Idle, 0, Vec::new());
    assert!(!machine.can_fire(Trigger::Start));
    assert!(!machine.try_fire(Trigger::Start));
    assert_eq!(machine.current_state(), State::Idle);
    assert!(machine.log.is_empty());

    let err = machine.fire(Trigger::Start).unwrap_err();
    assert_eq!(err.state, State::Idle);
    assert_eq!(err.trigger, Trigger::Start);
    assert_eq!(
        err.to_string(),
        "no valid transition from state Idle on trigger Start"
    );
}

#[test]
fn undeclared_trigger_is_rejected() {
    use job::{Job, State, Trigger};

    let mut machine = Job::new(State::Idle, 3, Vec::new());
    assert!(!machine.try_fire(Trigger::Reset));
    assert!(machine.fire(Trigger::Finish).is_err());
    assert_eq!(machine.current_state(), State::Idle);
}

#[test]
fn permitted_triggers_respect_guards() {
    use job::{Job, State, Trigger};

    let mut machine = Job::new(State::Idle, 1, Vec::new());
    assert_eq!(machine.permitted_triggers(), vec![Trigger::Start]);

    machine.try_fire(Trigger::Start);
    assert_eq!(machine.permitted_triggers(), vec![Trigger::Finish]);

    let empty = Job::new(State::Idle, 0, Vec::new());
    assert!(empty.permitted_triggers().is_empty());
}

#[test]
fn entry_and_exit_callbacks_pick_the_basic_variant() {
    assert_eq!(job::Job::VARIANT, GenerationVariant::Basic);
    assert_eq!(relay::Relay::VARIANT, GenerationVariant::Pure);
}

#[test]
fn internal_transitions_skip_entry_and_exit() {
    use ticker::{State, Ticker, Trigger};

    let mut machine = Ticker::new(State::Running, 0, 2, 0, 0);
    assert!(machine.try_fire(Trigger::Tick));
    assert!(machine.try_fire(Trigger::Tick));
    assert!(!machine.try_fire(Trigger::Tick));

    assert_eq!(machine.current_state(), State::Running);
    assert_eq!(machine.ticks, 2);
    assert_eq!(machine.entries, 0);
    assert_eq!(machine.exits, 0);

    assert!(machine.try_fire(Trigger::Stop));
    assert_eq!(machine.exits, 1);
}

#[test]
fn structural_queries_ignore_guards() {
    use ticker::{State, Ticker, Trigger};

    let machine = Ticker::new(State::Running, 5, 5, 0, 0);
    assert!(!machine.can_fire(Trigger::Tick));
    assert!(machine.has_transition(Trigger::Tick));
    assert_eq!(machine.defined_triggers(), vec![Trigger::Tick, Trigger::Stop]);
    assert_eq!(machine.permitted_triggers(), vec![Trigger::Stop]);

    let stopped = Ticker::new(State::Stopped, 0, 0, 0, 0);
    assert!(!stopped.has_transition(Trigger::Tick));
    assert!(stopped.defined_triggers().is_empty());
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn capture_logs(run: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, run);
    captured.text()
}

#[test]
fn failing_action_aborts_the_transition_and_logs() {
    use document::{Document, State, Trigger};

    let mut machine = Document::new(State::Draft, true, Ok(true));
    let logs = capture_logs(|| {
        assert!(!machine.try_fire(Trigger::Save));
    });
    assert_eq!(machine.current_state(), State::Draft);
    assert!(logs.contains("state machine callback failed"));
    assert!(logs.contains("persist"));
    assert!(logs.contains("disk full"));

    machine.disk_full = false;
    assert!(machine.try_fire(Trigger::Save));
    assert_eq!(machine.current_state(), State::Saved);
}

#[test]
fn failing_guard_reads_as_false() {
    use document::{Document, State, Trigger};

    let mut machine = Document::new(State::Draft, false, Err("reviewer offline".to_string()));
    let logs = capture_logs(|| {
        assert!(!machine.can_fire(Trigger::Publish));
        assert!(!machine.try_fire(Trigger::Publish));
    });
    assert_eq!(machine.current_state(), State::Draft);
    assert!(logs.contains("guard failed"));
    assert!(logs.contains("reviewer offline"));

    machine.approval = Ok(true);
    assert!(machine.try_fire(Trigger::Publish));
}

#[test]
fn generated_machines_implement_the_trait() {
    use relay::{Relay, State, Trigger};

    let mut machine = Relay::new(State::Open);
    let taken = fire_all(&mut machine, &[Trigger::Toggle, Trigger::Toggle, Trigger::Toggle]);
    assert_eq!(taken, 3);
    assert_eq!(StateMachine::current_state(&machine), State::Closed);
    assert_eq!(StateMachine::permitted_triggers(&machine), vec![Trigger::Toggle]);

    let mut jobs = job::Job::new(job::State::Idle, 1, Vec::new());
    let taken = fire_all(
        &mut jobs,
        &[job::Trigger::Start, job::Trigger::Start, job::Trigger::Finish],
    );
    assert_eq!(taken, 2);
}
