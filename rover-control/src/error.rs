use core::fmt;

/// A motion request with values the controllers refuse to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterError {
    /// Speeds are percentages in `0..=100`.
    Speed(i32),
    /// Turn angles must be finite and positive.
    Angle(f32),
    /// Servo angles lie in `0..=180`.
    ServoAngle(i32),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::Speed(s) => write!(f, "speed {} is outside 0..=100", s),
            ParameterError::Angle(a) => write!(f, "turn angle {} is not a positive number", a),
            ParameterError::ServoAngle(a) => write!(f, "servo angle {} is outside 0..=180", a),
        }
    }
}

/// Why a motion was not (fully) carried out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionError<E> {
    /// Nothing was actuated.
    Parameter(ParameterError),
    /// The motor driver failed. The wheels may be in any state.
    Actuator(E),
}

impl<E> From<ParameterError> for MotionError<E> {
    fn from(e: ParameterError) -> Self {
        MotionError::Parameter(e)
    }
}

impl<E: fmt::Debug> fmt::Display for MotionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::Parameter(e) => write!(f, "refused: {}", e),
            MotionError::Actuator(e) => write!(f, "motor driver error: {:?}", e),
        }
    }
}

pub fn check_speed(speed: u8) -> Result<u8, ParameterError> {
    if speed > 100 {
        return Err(ParameterError::Speed(speed as i32));
    }
    Ok(speed)
}

/// Speeds coming from outside (app messages) arrive as plain integers.
pub fn speed_from_i32(speed: i32) -> Result<u8, ParameterError> {
    u8::try_from(speed)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or(ParameterError::Speed(speed))
}

pub fn check_angle(angle: f32) -> Result<f32, ParameterError> {
    if !angle.is_finite() || angle <= 0.0 {
        return Err(ParameterError::Angle(angle));
    }
    Ok(angle)
}

pub fn servo_angle_from_i32(angle: i32) -> Result<u8, ParameterError> {
    u8::try_from(angle)
        .ok()
        .filter(|a| *a <= 180)
        .ok_or(ParameterError::ServoAngle(angle))
}
